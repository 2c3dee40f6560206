//! LogSink - logs envelope summaries via tracing

use std::collections::HashMap;

use contracts::{BusMessage, ContractError, DataSink, Envelope};
use tracing::{info, instrument};

/// Sink that logs envelope summaries for debugging
pub struct LogSink {
    name: String,
    /// Log one envelope out of every `every` per topic
    every: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
        }
    }

    /// Params: `every` (log 1 in N envelopes per topic, default 1)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let every = params
            .get("every")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Self {
            name: name.into(),
            every,
        }
    }

    fn should_log(&self, envelope: &Envelope) -> bool {
        (envelope.seq.saturating_sub(1)).is_multiple_of(self.every)
    }

    fn log_summary(&self, envelope: &Envelope) {
        let frame_id = envelope
            .message
            .header()
            .map(|h| h.frame_id.as_str())
            .unwrap_or("");

        match &envelope.message {
            BusMessage::Image(image) => info!(
                sink = %self.name,
                topic = %envelope.topic,
                seq = envelope.seq,
                frame_id,
                width = image.width,
                height = image.height,
                encoding = image.encoding.as_str(),
                bytes = image.data.len(),
                "image"
            ),
            BusMessage::PointCloud(cloud) => info!(
                sink = %self.name,
                topic = %envelope.topic,
                seq = envelope.seq,
                frame_id,
                points = cloud.num_points(),
                "point cloud"
            ),
            BusMessage::StringArray(labels) => info!(
                sink = %self.name,
                topic = %envelope.topic,
                seq = envelope.seq,
                frame_id,
                labels = labels.data.len(),
                "labels"
            ),
            other => info!(
                sink = %self.name,
                topic = %envelope.topic,
                seq = envelope.seq,
                frame_id,
                kind = other.kind(),
                "message"
            ),
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic, seq = envelope.seq)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        if self.should_log(envelope) {
            self.log_summary(envelope);
        }
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Header, PointCloudMsg, Stamp};

    fn cloud_envelope(seq: u64) -> Envelope {
        let header = Header::new(Stamp::default(), "base_laser");
        Envelope {
            topic: "airsim/lidar".into(),
            seq,
            message: BusMessage::PointCloud(PointCloudMsg::xyz32(header, &[[1.0, 2.0, 3.0]])),
        }
    }

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        assert!(sink.write(&cloud_envelope(1)).await.is_ok());
    }

    #[test]
    fn test_every_param_throttles() {
        let params = HashMap::from([("every".to_string(), "10".to_string())]);
        let sink = LogSink::from_params("throttled", &params);
        assert!(sink.should_log(&cloud_envelope(1)));
        assert!(!sink.should_log(&cloud_envelope(2)));
        assert!(sink.should_log(&cloud_envelope(11)));
    }

    #[test]
    fn test_invalid_every_falls_back() {
        let params = HashMap::from([("every".to_string(), "0".to_string())]);
        let sink = LogSink::from_params("l", &params);
        assert_eq!(sink.every, 1);
        assert_eq!(sink.name(), "l");
    }
}
