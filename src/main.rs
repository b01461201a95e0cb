#[macro_use]
extern crate log;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use failure::err_msg;
use tokio::net::TcpListener;

use rust_ofp_core::apps::EventLogger;
use rust_ofp_core::events::EventBus;
use rust_ofp_core::ofp_controller::Controller;
use rust_ofp_core::settings::Settings;

#[tokio::main]
async fn main() -> Result<(), failure::Error> {
    log_panics::init();
    let path = env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(path.as_deref())?;
    log4rs::init_file(&settings.log_config, Default::default())
        .map_err(|e| err_msg(format!("Cannot configure logging from {}: {}", settings.log_config, e)))?;
    info!("rust_ofp_core starting");

    let bus = Arc::new(EventBus::new());
    bus.register_app(Box::new(EventLogger::new()));
    bus.start_apps();

    let listener = TcpListener::bind(settings.listen_address).await?;
    let controller = Arc::new(Controller::new(settings, bus)?);
    controller.start();
    info!("OpenFlow controller listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Cannot disable Nagle for {}: {}", peer, e);
        }
        controller.accept(stream, peer.to_string());
    }
}
