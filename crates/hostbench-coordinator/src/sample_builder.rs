//! Sample assembly
//!
//! A sample's metadata is the union of environment facts (who sent to whom,
//! thread count, addressing mode) and extraction facts (window size, jitter,
//! aggregate source). The two sources must not share a key.

use hostbench_common::{AddressingMode, Metadata, MetadataValue, Sample};
use hostbench_remote::Host;

/// Builds samples that share one set of environment facts
#[derive(Debug, Clone, Default)]
pub struct SampleBuilder {
    environment: Metadata,
}

impl SampleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment for a sender/receiver run
    pub fn for_pair(sender: &Host, receiver: &Host, mode: AddressingMode) -> Self {
        Self::new()
            .with("sending_machine_type", sender.machine_type.as_str())
            .with("sending_zone", sender.zone.as_str())
            .with("receiving_machine_type", receiver.machine_type.as_str())
            .with("receiving_zone", receiver.zone.as_str())
            .with("ip_type", mode.as_ref())
    }

    /// Environment for a single-host run
    pub fn for_host(host: &Host) -> Self {
        Self::new()
            .with("machine_type", host.machine_type.as_str())
            .with("zone", host.zone.as_str())
    }

    /// Add an environment fact
    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.environment.insert(key.to_string(), value.into());
        self
    }

    pub fn environment(&self) -> &Metadata {
        &self.environment
    }

    /// Merge environment and extraction metadata into a sample.
    ///
    /// # Panics
    /// If a key appears in both sources.
    pub fn build(&self, metric: &str, value: f64, unit: &str, extraction: Metadata) -> Sample {
        let mut metadata = self.environment.clone();
        for (key, value) in extraction {
            assert!(
                !metadata.contains_key(&key),
                "metadata key '{key}' set by both environment and extraction"
            );
            metadata.insert(key, value);
        }
        Sample::new(metric, value, unit, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbench_test_utils::test_host;

    #[test]
    fn test_merges_both_sources() {
        let a = test_host("vm-1", "10.0.0.1");
        let b = test_host("vm-2", "10.0.0.2");
        let builder = SampleBuilder::for_pair(&a, &b, AddressingMode::Internal)
            .with("sending_thread_count", 4u32);

        let mut extraction = Metadata::new();
        extraction.insert("buffer_size".into(), 8192i64.into());

        let sample = builder.build("Throughput", 940.0, "Mbits/sec", extraction);
        assert_eq!(sample.value(), 940.0);
        assert_eq!(sample.meta("sending_thread_count"), Some(&MetadataValue::Int(4)));
        assert_eq!(sample.meta("buffer_size"), Some(&MetadataValue::Int(8192)));
        assert_eq!(sample.meta("ip_type"), Some(&MetadataValue::Text("internal".into())));
        assert_eq!(sample.meta("receiving_zone"), Some(&MetadataValue::Text("us-central1-a".into())));
    }

    #[test]
    #[should_panic(expected = "metadata key 'ip_type' set by both")]
    fn test_key_collision_panics() {
        let builder = SampleBuilder::new().with("ip_type", "internal");
        let mut extraction = Metadata::new();
        extraction.insert("ip_type".into(), "external".into());
        builder.build("Throughput", 1.0, "Mbits/sec", extraction);
    }
}
