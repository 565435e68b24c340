//! Structured log macros.
//!
//! Every event carries `component = "channel-reconciler"` plus the channel
//! or organization it concerns, so log pipelines can group a pass without
//! parsing messages.

/// Log a channel-scoped event with standard fields.
///
/// ```rust,ignore
/// log_channel_event!(info, "Config update submitted", channel, tx_id = %receipt.transaction_id);
/// ```
#[macro_export]
macro_rules! log_channel_event {
    ($level:ident, $msg:expr, $channel:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = "channel-reconciler",
            channel = %$channel,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an organization-scoped event with standard fields.
#[macro_export]
macro_rules! log_org_event {
    ($level:ident, $msg:expr, $msp_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = "channel-reconciler",
            msp_id = %$msp_id,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_with_and_without_fields() {
        let channel = "demo";
        let msp_id = "Org1MSP";
        crate::log_channel_event!(info, "Channel event", channel);
        crate::log_channel_event!(warn, "Channel event", channel, attempt = 2, url = %"https://o0:9443");
        crate::log_org_event!(debug, "Org event", msp_id);
        crate::log_org_event!(error, "Org event", msp_id, channel = %channel);
    }
}
