use log::info;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Periodic snapshot of the learning progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    /// Identifies the simulation when several run side by side
    pub run: usize,
    /// Completed episodes
    pub episode: usize,
    /// Food eaten in the last episode
    pub score: usize,
    pub steps: usize,
    /// Food eaten over all episodes
    pub lifetime_score: usize,
    pub average_value: f64,
    pub exploration_rate: f64,
    pub learning_rate: f64,
}

/// One-way receiver of telemetry, it cannot influence the simulation.
pub trait TelemetrySink {
    fn push(&mut self, telemetry: Telemetry);
}

/// Writes telemetry to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn push(&mut self, t: Telemetry) {
        info!(
            "run {} episode {}: score={} steps={} lifetime={} avg_q={:.4} ε={:.4} α={:.4}",
            t.run,
            t.episode,
            t.score,
            t.steps,
            t.lifetime_score,
            t.average_value,
            t.exploration_rate,
            t.learning_rate
        );
    }
}

impl TelemetrySink for Vec<Telemetry> {
    fn push(&mut self, telemetry: Telemetry) {
        Vec::push(self, telemetry);
    }
}

/// Forwards to an async consumer, a closed channel drops the snapshot.
impl TelemetrySink for UnboundedSender<Telemetry> {
    fn push(&mut self, telemetry: Telemetry) {
        let _ = self.send(telemetry);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn telemetry(episode: usize) -> Telemetry {
        Telemetry {
            run: 0,
            episode,
            score: 1,
            steps: 10,
            lifetime_score: 3,
            average_value: 0.5,
            exploration_rate: 0.9,
            learning_rate: 0.1,
        }
    }

    #[test]
    fn sinks() {
        let mut vec: Vec<Telemetry> = Vec::new();
        TelemetrySink::push(&mut vec, telemetry(1));
        assert_eq!(vec, vec![telemetry(1)]);

        let (mut tx, mut rx) = unbounded_channel::<Telemetry>();
        TelemetrySink::push(&mut tx, telemetry(2));
        assert_eq!(rx.try_recv().unwrap(), telemetry(2));

        drop(rx);
        TelemetrySink::push(&mut tx, telemetry(3));

        LogSink.push(telemetry(4));
    }

    #[test]
    fn json() {
        let json = serde_json::to_value(telemetry(5)).unwrap();
        assert_eq!(json["episode"], 5);
        assert_eq!(json["lifetime_score"], 3);
        assert_eq!(json["exploration_rate"], 0.9);
    }
}
