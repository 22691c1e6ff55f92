//! Delimited-text encoding for the reference tables.

use std::borrow::Cow;

use metricflow::{ChannelDetail, PlanDetail};

/// A row that can be written as one comma-delimited line.
pub trait CsvRecord {
    /// Column names, in field order.
    const HEADER: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

impl CsvRecord for PlanDetail {
    const HEADER: &'static [&'static str] = &[
        "plan_id",
        "plan_name",
        "monthly_price",
        "annual_price",
        "tier_order",
        "features",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.plan_id.clone(),
            self.plan_name.to_string(),
            self.monthly_price.to_string(),
            self.annual_price.to_string(),
            self.tier_order.to_string(),
            self.features.clone(),
        ]
    }
}

impl CsvRecord for ChannelDetail {
    const HEADER: &'static [&'static str] = &["channel_name", "channel_type", "default_cac"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.channel_name.clone(),
            self.channel_type.to_string(),
            self.default_cac.to_string(),
        ]
    }
}

/// Quotes a field when it contains a delimiter, quote, or line break.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Encodes a header line followed by one line per row.
pub fn encode_csv<T: CsvRecord>(rows: &[T]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&T::HEADER.join(","));
    out.push('\n');

    for row in rows {
        let fields = row.fields();
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow::{ChannelType, PlanTier};

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a, b"), "\"a, b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_encode_plan_details() {
        let rows = vec![PlanDetail {
            plan_id: "plan_starter".into(),
            plan_name: PlanTier::Starter,
            monthly_price: 29.0,
            annual_price: 295.8,
            tier_order: 2,
            features: "basic_dashboard, 25_reports, api_access".into(),
        }];

        let text = String::from_utf8(encode_csv(&rows)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "plan_id,plan_name,monthly_price,annual_price,tier_order,features"
        );
        assert_eq!(
            lines[1],
            "plan_starter,starter,29,295.8,2,\"basic_dashboard, 25_reports, api_access\""
        );
    }

    #[test]
    fn test_encode_channel_details() {
        let rows = vec![ChannelDetail {
            channel_name: "paid_search".into(),
            channel_type: ChannelType::Paid,
            default_cac: 42.5,
        }];

        let text = String::from_utf8(encode_csv(&rows)).unwrap();
        assert_eq!(text, "channel_name,channel_type,default_cac\npaid_search,paid,42.5\n");
    }
}
