//! DogStatsD line encoding.

pub const SAMPLE_RATE_ALWAYS: f64 = 1.0;

/// Appends `<namespace><name>:<value>|g[|@<rate>][|#<tags>]` to `buf`.
pub fn encode_gauge(
    buf: &mut String,
    namespace: &str,
    name: &str,
    value: f64,
    tags: &[String],
    sample_rate: f64,
) {
    buf.push_str(namespace);
    buf.push_str(name);
    buf.push(':');
    buf.push_str(&value.to_string());
    buf.push_str("|g");
    if sample_rate < SAMPLE_RATE_ALWAYS {
        buf.push_str("|@");
        buf.push_str(&sample_rate.to_string());
    }
    encode_tags(buf, tags);
}

fn encode_tags(buf: &mut String, tags: &[String]) {
    let mut tags = tags.iter();
    let Some(first) = tags.next() else {
        return;
    };
    buf.push_str("|#");
    buf.push_str(first);
    for tag in tags {
        buf.push(',');
        buf.push_str(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge(value: f64, tags: &[&str], sample_rate: f64) -> String {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let mut buf = String::new();
        encode_gauge(&mut buf, "logstash.", "RateOut", value, &tags, sample_rate);
        buf
    }

    #[test]
    fn test_gauge_with_hostname_tag() {
        assert_eq!(
            gauge(4.0, &["nodename:ls-01"], 1.0),
            "logstash.RateOut:4|g|#nodename:ls-01"
        );
    }

    #[test]
    fn test_gauge_fractional_and_negative() {
        assert_eq!(gauge(0.25, &[], 1.0), "logstash.RateOut:0.25|g");
        assert_eq!(gauge(-4.0, &[], 1.0), "logstash.RateOut:-4|g");
    }

    #[test]
    fn test_gauge_sample_rate_and_multiple_tags() {
        assert_eq!(
            gauge(6.5, &["a:1", "b:2"], 0.5),
            "logstash.RateOut:6.5|g|@0.5|#a:1,b:2"
        );
    }

    #[test]
    fn test_appends_to_existing_buffer() {
        let mut buf = String::from("x");
        encode_gauge(&mut buf, "", "m", 1.0, &[], 1.0);
        assert_eq!(buf, "xm:1|g");
    }
}
