use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::events::{ControllerApp, ControllerEvent};
use crate::ofp_controller::Controller;
use crate::ofp_handler;
use crate::ofp_header::OPENFLOW_0_04_VERSION;
use crate::switch::{Dpid, StatsKind, Switch};

/// Periodically requests flow and port statistics from every connected switch.
pub struct StatsPoller {
    controller: Arc<Controller>,
    interval: Duration,
    max_skips: u32,
    skips: HashMap<Dpid, u32>,
}

impl StatsPoller {
    pub fn new(controller: Arc<Controller>) -> StatsPoller {
        let interval = controller.settings().stats_interval();
        let max_skips = controller.settings().stats_request_skip;
        StatsPoller { controller, interval, max_skips, skips: HashMap::new() }
    }

    /// Delay of the `index`th of `count` switches, spread over the first half of the
    /// interval.
    pub fn stagger(interval: Duration, index: usize, count: usize) -> Duration {
        if count == 0 {
            return Duration::from_secs(0);
        }
        (interval / 2) * index as u32 / count as u32
    }

    /// Whether `switch` gets new requests this round. A 1.3 switch still answering
    /// the previous requests is skipped, at most `max_skips` rounds in a row.
    pub fn should_poll(&mut self, switch: &Switch) -> bool {
        let pending = switch.version() == Some(OPENFLOW_0_04_VERSION)
            && (switch.outstanding_request(StatsKind::Flow).is_some()
                || switch.outstanding_request(StatsKind::Port).is_some());
        if pending {
            let skips = self.skips.entry(switch.dpid()).or_insert(0);
            if *skips < self.max_skips {
                *skips += 1;
                debug!("Statistics of {} still outstanding, skipping poll {}", switch, skips);
                return false;
            }
            warn!("Statistics of {} unanswered after {} polls, requesting again", switch, skips);
        }
        self.skips.remove(&switch.dpid());
        true
    }

    /// Start one polling round. Each returned task sends the requests of one switch.
    pub fn poll_round(&mut self) -> Vec<JoinHandle<()>> {
        let switches = self.controller.registry().connected();
        self.skips.retain(|dpid, _| switches.iter().any(|s| s.dpid() == *dpid));
        let due: Vec<Arc<Switch>> = switches.into_iter().filter(|s| self.should_poll(s)).collect();
        let count = due.len();
        trace!("Polling statistics of {} switches", count);
        due.into_iter()
            .enumerate()
            .map(|(index, switch)| {
                let delay = StatsPoller::stagger(self.interval, index, count);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = ofp_handler::request_stats(&switch) {
                        warn!("Cannot poll statistics of {}: {}", switch, e);
                    }
                })
            })
            .collect()
    }

    /// Poll every interval. The first round comes one interval after the start, since
    /// the handshake already requests statistics.
    pub async fn run(mut self) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        loop {
            ticker.tick().await;
            self.poll_round();
        }
    }
}

/// Logs every controller event.
#[derive(Debug, Default)]
pub struct EventLogger {
    logged: u64,
}

impl EventLogger {
    pub fn new() -> EventLogger {
        EventLogger::default()
    }

    pub fn logged(&self) -> u64 {
        self.logged
    }
}

impl ControllerApp for EventLogger {
    fn name(&self) -> &str {
        "event-logger"
    }

    fn event(&mut self, event: Arc<ControllerEvent>) {
        self.logged += 1;
        match *event {
            ControllerEvent::InterfacesCreated { ref interfaces, .. } => {
                info!("{}: {} interfaces", event, interfaces.len())
            }
            ControllerEvent::FlowStatsReceived { ref stats, .. } => info!("{}: {} flows", event, stats.len()),
            ControllerEvent::PortStatsReceived { ref stats, .. } => info!("{}: {} ports", event, stats.len()),
            ControllerEvent::FlowRemoved { ref flow, reason, .. } => match *flow {
                Some(ref flow) => info!("{}: {} ({:?})", event, flow, reason),
                None => info!("{}: untracked flow ({:?})", event, reason),
            },
            ControllerEvent::PacketIn { ref packet, .. } => {
                debug!("{}: {} bytes from port {:?}", event, packet.total_len, packet.in_port)
            }
            ControllerEvent::ConnectionLost { connection, ref reason, .. } => {
                info!("{}: connection {} {}", event, connection, reason)
            }
            _ => info!("{}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::handle;
    use crate::connection::{CloseReason, ConnectionHandle, ConnectionId};
    use crate::events::tests::RecordingEmitter;
    use crate::message::Message;
    use crate::ofp_header::Xid;
    use crate::settings::Settings;
    use tokio::sync::mpsc;

    fn poller(skip: u32) -> StatsPoller {
        let settings = Settings { stats_request_skip: skip, ..Settings::default() };
        let controller = Controller::new(settings, Arc::new(RecordingEmitter::default())).unwrap();
        StatsPoller::new(Arc::new(controller))
    }

    fn connect(poller: &StatsPoller, dpid: Dpid, version: u8)
               -> (Arc<Switch>, mpsc::Receiver<(Xid, Message)>, mpsc::Receiver<CloseReason>) {
        let (connection, writer, control): (ConnectionHandle, _, _) = handle(dpid, 16);
        connection.set_version(version);
        let (switch, _) = poller.controller.registry().get_or_create(dpid);
        switch.attach(Arc::new(connection));
        (switch, writer, control)
    }

    #[test]
    fn test_stagger_stays_in_first_half() {
        let interval = Duration::from_secs(60);
        assert_eq!(StatsPoller::stagger(interval, 0, 3), Duration::from_secs(0));
        assert_eq!(StatsPoller::stagger(interval, 1, 3), Duration::from_secs(10));
        assert_eq!(StatsPoller::stagger(interval, 2, 3), Duration::from_secs(20));
        assert!(StatsPoller::stagger(interval, 99, 100) < Duration::from_secs(30));
        assert_eq!(StatsPoller::stagger(interval, 0, 0), Duration::from_secs(0));
    }

    #[test]
    fn test_outstanding_1_3_requests_skip_polls() {
        let mut poller = poller(2);
        let (switch, _writer, _control) = connect(&poller, 1, 4);
        switch.record_request(StatsKind::Flow, 10);

        assert!(!poller.should_poll(&switch));
        assert!(!poller.should_poll(&switch));
        // starts fresh after the allowed skips
        assert!(poller.should_poll(&switch));
        assert!(!poller.should_poll(&switch));

        switch.complete_request(StatsKind::Flow, 10);
        assert!(poller.should_poll(&switch));
    }

    #[test]
    fn test_1_0_switches_are_always_polled() {
        let mut poller = poller(2);
        let (switch, _writer, _control) = connect(&poller, 1, 1);
        switch.record_request(StatsKind::Port, 3);
        assert!(poller.should_poll(&switch));
        assert!(poller.should_poll(&switch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_round_requests_each_connected_switch() {
        let mut poller = poller(2);
        let (first, mut first_writer, _c1) = connect(&poller, 1, 4);
        let (second, mut second_writer, _c2) = connect(&poller, 2, 1);

        for task in poller.poll_round() {
            task.await.unwrap();
        }
        assert_eq!(first_writer.try_recv().unwrap().1.version(), 4);
        assert_eq!(second_writer.try_recv().unwrap().1.version(), 1);
        assert!(first.outstanding_request(StatsKind::Port).is_some());
        assert!(second.outstanding_request(StatsKind::Flow).is_some());

        // the 1.3 switch has not answered yet
        assert_eq!(poller.poll_round().len(), 1);
        assert_eq!(ConnectionId(1), first.connection().unwrap().id());
    }

    #[test]
    fn test_event_logger_counts_events() {
        let mut logger = EventLogger::new();
        logger.event(Arc::new(ControllerEvent::ConnectionLost {
            connection: ConnectionId(1),
            dpid: None,
            reason: CloseReason::Eof,
        }));
        assert_eq!(logger.logged(), 1);
        assert_eq!(logger.name(), "event-logger");
    }
}
