//! 🧾 Records: turning a wall of space-separated text into something with keys.
//!
//! An ALB log line looks like someone sneezed on a CSV file and replaced all the
//! commas with spaces. Quoted spans (`"GET https://... HTTP/1.1"`) keep their spaces,
//! everything else splits on them. The `csv` crate already knows this dance if you
//! tell it the delimiter is `b' '`, so we let it lead.
//!
//! 🧠 Knowledge graph:
//! - [`parse_stream`] runs on a blocking thread: it reads the decompressed bytes from a
//!   plain `std::io::Read` (the conduit reader) and pushes [`LogEntry`]s into the
//!   intake queue with `send_blocking`, which is where parser backpressure lives.
//! - [`record_to_log_entry`] is the pure part: count check, timestamp, projection.
//! - First bad line ends the stream. Not skipped, ended. Everything already queued still ships.

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use async_channel::Sender;
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::common::LogEntry;
use crate::fields::{FIELD_COUNT, FieldSelection, TIME_FIELD_INDEX};

/// 🔄 Read every record from `reader`, project it, and hand it to the intake queue.
///
/// Returns how many entries were handed off. End of stream is success. A malformed
/// record, a bad timestamp, an I/O error from the reader, or a closed intake queue all
/// stop the stream and come back as `Err`; whatever was queued before that stays queued.
pub fn parse_stream<R: Read>(
    reader: R,
    selection: &FieldSelection,
    intake: &Sender<LogEntry>,
) -> Result<u64> {
    let mut the_csv_reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        // -- 📏 we count the columns ourselves, with a better error message
        .flexible(true)
        .from_reader(reader);

    let mut the_record = csv::ByteRecord::new();
    let mut the_tokens: Vec<String> = Vec::with_capacity(FIELD_COUNT);
    let mut handed_off = 0u64;

    loop {
        let has_record = the_csv_reader
            .read_byte_record(&mut the_record)
            .context("error reading a record")?;
        if !has_record {
            // 🏁 EOF. The well is dry. That's a success, not a tragedy.
            break;
        }

        the_tokens.clear();
        the_tokens.extend(
            the_record
                .iter()
                .map(|token| String::from_utf8_lossy(token).into_owned()),
        );

        let the_entry = record_to_log_entry(&the_tokens, selection)?;
        // -- 🚦 blocks right here when the accumulator is 12,500 entries behind
        intake
            .send_blocking(the_entry)
            .context("💀 the batch accumulator hung up before the parser finished. Nobody is listening.")?;
        handed_off += 1;
    }

    trace!("🧾 parser handed off {} entries", handed_off);
    Ok(handed_off)
}

/// 🎯 One raw record in, one projected, time-stamped [`LogEntry`] out.
///
/// - Wrong token count: `invalid log format: expected 30 fields, got <n>`.
/// - Unparseable `time` column: `error parsing timestamp: <cause>`.
/// - Otherwise every selected column lands in `fields` under its schema name.
pub fn record_to_log_entry<S: AsRef<str>>(record: &[S], selection: &FieldSelection) -> Result<LogEntry> {
    if record.len() != FIELD_COUNT {
        bail!(
            "invalid log format: expected {} fields, got {}",
            FIELD_COUNT,
            record.len()
        );
    }

    let the_timestamp = parse_timestamp(record[TIME_FIELD_INDEX].as_ref())?;

    let mut fields = BTreeMap::new();
    for (index, value) in record.iter().enumerate() {
        if selection.include_field(index) {
            let the_name = selection.name_for_index(index)?;
            fields.insert(the_name.to_string(), value.as_ref().to_string());
        }
    }

    Ok(LogEntry {
        fields,
        timestamp: the_timestamp,
    })
}

/// ⏰ Strict RFC 3339, fractional seconds welcome, timezone required.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(cause) => bail!("error parsing timestamp: {} (value was '{}')", cause, raw),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    /// 📜 A real-looking ALB line, all 30 columns, quoted spans and all.
    pub(crate) const SAMPLE_LINE: &str = r#"https 2024-03-21T16:10:26.071854Z app/example-prod-lb/xxxxxxx4 192.0.2.104:36217 10.0.0.24:3003 0.004 0.024 0.003 203 203 1694 10783 "PUT https://example.com:443/api/modify?user_ids=xxxxx4-xxxx-xxxx-xxxx-xxxxxxxxxxxx&ref_date= HTTP/1.1" "axios/1.6.5" ECDHE-RSA-AES256-GCM-SHA384 TLSv1.3 arn:aws:elasticloadbalancing:xx-west-1:987654321098:targetgroup/example-prod-tg/xxxxxxxx4 "Root=1-xxxxxx4-xxxxxxxxxxxxxxxxxxxxxxxx" "example.com" "arn:aws:acm:xx-west-1:987654321098:certificate/aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa" 203 2024-03-21T16:10:26.061854Z "cache" "-" "-" "10.0.0.24:3003" "203" "-" "-" "TID_a1b2c3d4e5f67890abcdef1234567890""#;

    pub(crate) const SAMPLE_REQUEST: &str =
        "PUT https://example.com:443/api/modify?user_ids=xxxxx4-xxxx-xxxx-xxxx-xxxxxxxxxxxx&ref_date= HTTP/1.1";

    /// 🧪 Same line, different timestamp, for ordering tests.
    pub(crate) fn sample_line_at(timestamp: &str) -> String {
        SAMPLE_LINE.replacen("2024-03-21T16:10:26.071854Z", timestamp, 1)
    }

    fn thirty_tokens() -> Vec<String> {
        let mut tokens: Vec<String> = (0..FIELD_COUNT).map(|i| format!("v{i}")).collect();
        tokens[TIME_FIELD_INDEX] = "2024-03-21T16:10:26.071854Z".to_string();
        tokens
    }

    /// 🐛 A reader that gives up halfway, like my gym membership.
    struct FlakyReader {
        served: bool,
        payload: Vec<u8>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("gzip: invalid checksum"));
            }
            self.served = true;
            let n = self.payload.len().min(buf.len());
            buf[..n].copy_from_slice(&self.payload[..n]);
            Ok(n)
        }
    }

    #[test]
    fn the_one_where_a_real_alb_line_parses_with_its_quotes_intact() {
        let (tx, rx) = async_channel::unbounded();
        let the_count = parse_stream(SAMPLE_LINE.as_bytes(), &FieldSelection::all(), &tx)
            .expect("💀 the sample line is well-formed");

        assert_eq!(the_count, 1);
        let the_entry = rx.try_recv().expect("💀 one entry should be queued");
        assert_eq!(the_entry.fields.len(), 30);
        assert_eq!(the_entry.fields["request"], SAMPLE_REQUEST);
        assert_eq!(the_entry.fields["user_agent"], "axios/1.6.5");
        assert_eq!(the_entry.fields["conn_trace_id"], "TID_a1b2c3d4e5f67890abcdef1234567890");
        assert_eq!(
            the_entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "2024-03-21T16:10:26.071854Z"
        );
    }

    #[test]
    fn the_one_where_projection_keeps_only_the_invited_columns() {
        let the_selection = FieldSelection::resolve("type,time,request").expect("💀 valid names");
        let (tx, rx) = async_channel::unbounded();
        parse_stream(SAMPLE_LINE.as_bytes(), &the_selection, &tx).expect("💀 should parse");

        let the_entry = rx.try_recv().expect("💀 one entry");
        let the_keys: Vec<&str> = the_entry.fields.keys().map(String::as_str).collect();
        assert_eq!(the_keys, vec!["request", "time", "type"]);
        assert_eq!(the_entry.fields["type"], "https");
    }

    #[test]
    fn the_one_where_blank_lines_and_crlf_do_not_count_as_records() {
        let the_input = format!("{SAMPLE_LINE}\r\n\r\n\n{SAMPLE_LINE}\n");
        let (tx, rx) = async_channel::unbounded();
        let the_count = parse_stream(the_input.as_bytes(), &FieldSelection::all(), &tx)
            .expect("💀 blank lines are not errors");
        assert_eq!(the_count, 2);
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn the_one_where_an_empty_stream_is_just_a_quiet_success() {
        let (tx, rx) = async_channel::unbounded();
        let the_count = parse_stream(&b""[..], &FieldSelection::all(), &tx).expect("💀 EOF is fine");
        assert_eq!(the_count, 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn the_one_where_a_short_line_stops_the_show_but_keeps_the_earlier_acts() {
        let the_input = format!("{SAMPLE_LINE}\n{SAMPLE_LINE}\nhttps too short\n{SAMPLE_LINE}\n");
        let (tx, rx) = async_channel::unbounded();

        let the_error = parse_stream(the_input.as_bytes(), &FieldSelection::all(), &tx)
            .expect_err("💀 a 3-token line must abort the stream");

        assert_eq!(the_error.to_string(), "invalid log format: expected 30 fields, got 3");
        // -- the two lines before the bad one made it, the one after never got read
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn the_one_where_token_count_mismatches_name_both_numbers() {
        for the_len in [0usize, 1, 29, 31, 60] {
            let the_tokens: Vec<String> = (0..the_len).map(|i| i.to_string()).collect();
            let the_error = record_to_log_entry(&the_tokens, &FieldSelection::all())
                .expect_err("💀 wrong lengths are never OK");
            assert_eq!(
                the_error.to_string(),
                format!("invalid log format: expected 30 fields, got {the_len}")
            );
        }
    }

    #[test]
    fn the_one_where_a_bad_timestamp_is_called_out() {
        let mut the_tokens = thirty_tokens();
        the_tokens[TIME_FIELD_INDEX] = "yesterday-ish".to_string();

        let the_error = record_to_log_entry(&the_tokens, &FieldSelection::all())
            .expect_err("💀 'yesterday-ish' is not RFC 3339");
        assert!(the_error.to_string().starts_with("error parsing timestamp:"));
        assert!(the_error.to_string().contains("yesterday-ish"));
    }

    #[test]
    fn the_one_where_a_timestamp_without_a_timezone_is_too_vague() {
        let mut the_tokens = thirty_tokens();
        the_tokens[TIME_FIELD_INDEX] = "2024-03-21T16:10:26".to_string();
        assert!(record_to_log_entry(&the_tokens, &FieldSelection::all()).is_err());
    }

    #[test]
    fn the_one_where_projecting_twice_gives_the_same_answer() {
        let the_selection = FieldSelection::resolve("elb,time,sent_bytes").expect("💀 valid names");
        let the_tokens = thirty_tokens();

        let first = record_to_log_entry(&the_tokens, &the_selection).expect("💀 valid record");
        let second = record_to_log_entry(&the_tokens, &the_selection).expect("💀 valid record");
        assert_eq!(first, second);
        assert_eq!(first.fields.len(), 3);
        assert_eq!(first.fields["sent_bytes"], "v11");
    }

    #[test]
    fn the_one_where_a_reader_error_surfaces_instead_of_a_silent_truncation() {
        let the_reader = FlakyReader {
            served: false,
            payload: format!("{SAMPLE_LINE}\n").into_bytes(),
        };
        let (tx, rx) = async_channel::unbounded();

        let the_error = parse_stream(the_reader, &FieldSelection::all(), &tx)
            .expect_err("💀 the reader error must come through");
        assert!(format!("{the_error:#}").contains("invalid checksum"));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn the_one_where_a_full_intake_queue_makes_the_parser_wait_instead_of_dropping() {
        let the_input: String = (0..50)
            .map(|i| format!("{}\n", sample_line_at(&format!("2024-03-21T16:{:02}:00Z", i))))
            .collect();
        let (tx, rx) = async_channel::bounded::<LogEntry>(2);

        let the_parser = std::thread::spawn(move || parse_stream(the_input.as_bytes(), &FieldSelection::all(), &tx));

        // -- nobody is draining yet, so the parser fills both slots and parks
        let the_deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while rx.len() < 2 && std::time::Instant::now() < the_deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(rx.len(), 2, "the queue holds exactly its capacity while stalled");
        assert!(!the_parser.is_finished(), "the parser is parked, not done");

        let mut the_minutes = Vec::new();
        while let Ok(the_entry) = rx.recv_blocking() {
            the_minutes.push(the_entry.fields["time"][14..16].to_string());
        }
        let the_count = the_parser
            .join()
            .expect("💀 the parser thread should not panic")
            .expect("💀 every line is well-formed");

        assert_eq!(the_count, 50);
        let the_expected: Vec<String> = (0..50).map(|i| format!("{:02}", i)).collect();
        assert_eq!(the_minutes, the_expected, "every line arrived, in order");
    }

    #[test]
    fn the_one_where_a_closed_intake_queue_stops_the_parser() {
        let (tx, rx) = async_channel::unbounded::<LogEntry>();
        drop(rx);

        let the_error = parse_stream(SAMPLE_LINE.as_bytes(), &FieldSelection::all(), &tx)
            .expect_err("💀 nobody is listening, so we stop talking");
        assert!(the_error.to_string().contains("hung up"));
    }
}
