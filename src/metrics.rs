//! Metrics emitted by the transport
//!
//! All functions go through the `metrics` facade; nothing is recorded unless the
//! application installs a recorder.

/// Metric label values
pub mod labels {
    /// Rejection: unsupported protocol version
    pub const REASON_VERSION: &str = "version";
    /// Rejection: malformed startup packet
    pub const REASON_FRAMING: &str = "framing";
    /// Rejection: stream failure or early close
    pub const REASON_IO: &str = "io";
}

/// Counter helpers
pub mod counters {
    use ::metrics::counter;

    /// A startup packet with version 3.0 was accepted
    pub fn startup_accepted() {
        counter!("pg_transport_startup_total", "outcome" => "accepted").increment(1);
    }

    /// A startup packet was rejected
    pub fn startup_rejected(reason: &'static str) {
        counter!("pg_transport_startup_total", "outcome" => "rejected", "reason" => reason)
            .increment(1);
    }

    /// A frontend message was decoded
    pub fn message_received(kind: &'static str) {
        counter!("pg_transport_messages_received_total", "kind" => kind).increment(1);
    }

    /// A backend message was written
    pub fn message_sent(kind: &'static str) {
        counter!("pg_transport_messages_sent_total", "kind" => kind).increment(1);
    }

    /// An extended-query sequence began
    pub fn transaction_opened() {
        counter!("pg_transport_extended_query_total", "event" => "opened").increment(1);
    }

    /// An extended-query sequence ended with Sync
    pub fn transaction_closed() {
        counter!("pg_transport_extended_query_total", "event" => "closed").increment(1);
    }

    /// The transport emitted ReadyForQuery on its own before an idle read
    pub fn ready_for_query_emitted() {
        counter!("pg_transport_ready_for_query_emitted_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_without_recorder() {
        // No recorder installed: calls are no-ops
        counters::startup_accepted();
        counters::startup_rejected(labels::REASON_VERSION);
        counters::message_received("query");
        counters::message_sent("ready_for_query");
        counters::transaction_opened();
        counters::transaction_closed();
        counters::ready_for_query_emitted();
    }
}
