pub const TOPIC_ROOT: &str = "landroid";

pub fn state_topic(serial: &str, field: &str) -> String {
    format!("{TOPIC_ROOT}/{serial}/state/{field}")
}

pub fn snapshot_topic(serial: &str) -> String {
    format!("{TOPIC_ROOT}/{serial}/state")
}

/// Wildcard subscription for every intent addressed to one device.
pub fn intent_filter(serial: &str) -> String {
    format!("{TOPIC_ROOT}/{serial}/cmnd/#")
}

/// Extracts the intent identifier from `landroid/<serial>/cmnd/<channel>`.
pub fn intent_channel<'a>(serial: &str, topic: &'a str) -> Option<&'a str> {
    topic
        .strip_prefix(TOPIC_ROOT)?
        .strip_prefix('/')?
        .strip_prefix(serial)?
        .strip_prefix("/cmnd/")
        .filter(|channel| !channel.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_channel_round_trip() {
        assert_eq!(
            intent_channel("2019", "landroid/2019/cmnd/zones/2/meter"),
            Some("zones/2/meter")
        );
        assert_eq!(intent_channel("2019", "landroid/2020/cmnd/lock"), None);
        assert_eq!(intent_channel("2019", "landroid/2019/state/lock"), None);
        assert_eq!(intent_channel("2019", "landroid/2019/cmnd/"), None);
        assert_eq!(state_topic("2019", "battery/level"), "landroid/2019/state/battery/level");
        assert_eq!(intent_filter("2019"), "landroid/2019/cmnd/#");
    }
}
