//! # patch
//!
//! Copies a book from input to output, putting a freshly fetched price record in
//! front of the first existing record for each commodity.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

use crate::quote::{PriceFetcher, QuoteSource};
use crate::record::{self, Event, Matcher};

/// Streams `input` to `out`, inserting new price records.
///
/// `stamp` is the time written into every new record and `label` names the book
/// in log messages. Each code gets at most one lookup per book, whether or not
/// that lookup worked.
///
/// Returns true if at least one record was inserted.
pub fn patch<R, W, Q>(
    mut input: R,
    out: &mut W,
    fetcher: &mut PriceFetcher<Q>,
    stamp: &str,
    label: &str,
) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
    Q: QuoteSource,
{
    let mut matcher = Matcher::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut changed = false;

    loop {
        let mut line = Vec::new();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        match matcher.feed(line) {
            Event::Pass(raw) => out.write_all(&raw)?,
            Event::Buffered => {}
            Event::Code(Some(code)) => {
                if !seen.insert(code.clone()) {
                    continue;
                }
                match fetcher.fetch(&code) {
                    Ok(price) => {
                        info!("Fetched {code:4} @ ${} for {label}", price.value);
                        out.write_all(record::render(&code, stamp, &price.formatted).as_bytes())?;
                        changed = true;
                    }
                    Err(e) => warn!("Error fetching {code}: {e:#}"),
                }
            }
            Event::Code(None) => debug!("price record without a readable commodity id in {label}"),
            Event::End(block) => out.write_all(&block)?,
        }
    }

    if let Some(block) = matcher.finish() {
        debug!("unterminated price record at end of {label}");
        out.write_all(&block)?;
    }

    out.flush()?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::stub::StubQuotes;
    use std::io::Cursor;

    const STAMP: &str = "2020-01-15 14:30:05 +1100";
    const OLD_STAMP: &str = "2020-01-14 10:00:00 +1100";

    fn run(fetcher: &mut PriceFetcher<StubQuotes>, input: &str) -> (bool, String) {
        let mut out = Vec::new();
        let changed = patch(Cursor::new(input), &mut out, fetcher, STAMP, "test.gnucash").unwrap();
        (changed, String::from_utf8(out).unwrap())
    }

    fn book(records: &[String]) -> String {
        let mut s = String::from("<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<gnc-v2>\n<gnc:pricedb version=\"1\">\n");
        for r in records {
            s.push_str(r);
        }
        s.push_str("</gnc:pricedb>\n</gnc-v2>\n");
        s
    }

    #[test]
    fn no_records_means_identical_output() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let input = "<gnc-v2>\r\n  <gnc:book>\n\n  odd \u{e9} text   \n</gnc-v2>";

        let (changed, out) = run(&mut fetcher, input);
        assert!(!changed);
        assert_eq!(out, input);
        assert_eq!(fetcher.source().calls(), 0);
    }

    #[test]
    fn new_record_goes_before_the_existing_one() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let old = record::render("BHP", OLD_STAMP, "44");
        let input = book(&[old.clone()]);

        let (changed, out) = run(&mut fetcher, &input);
        assert!(changed);

        let new = record::render("BHP", STAMP, "9047/200");
        assert_eq!(out, book(&[new, old]));
    }

    #[test]
    fn repeated_code_in_one_book_is_fetched_once() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235), ("CBA", 100.5)]));
        let bhp1 = record::render("BHP", OLD_STAMP, "44");
        let cba = record::render("CBA", OLD_STAMP, "99");
        let bhp2 = record::render("BHP", "2020-01-13 10:00:00 +1100", "43");
        let input = book(&[bhp1.clone(), cba.clone(), bhp2.clone()]);

        let (changed, out) = run(&mut fetcher, &input);
        assert!(changed);
        assert_eq!(
            out,
            book(&[
                record::render("BHP", STAMP, "9047/200"),
                bhp1,
                record::render("CBA", STAMP, "201/2"),
                cba,
                bhp2,
            ])
        );
        assert_eq!(*fetcher.source().asked.borrow(), vec!["BHP", "CBA"]);
    }

    #[test]
    fn second_book_uses_the_cache() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let input = book(&[record::render("BHP", OLD_STAMP, "44")]);

        let (_, first) = run(&mut fetcher, &input);
        let (changed, second) = run(&mut fetcher, &input);
        assert!(changed);
        assert_eq!(first, second);
        assert_eq!(fetcher.source().calls(), 1);
    }

    #[test]
    fn updated_book_gets_one_new_record_per_code() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let input = book(&[record::render("BHP", OLD_STAMP, "44")]);

        let (_, once) = run(&mut fetcher, &input);
        let (_, twice) = run(&mut fetcher, &once);
        // The record inserted by the first pass is now the first BHP record, so the
        // second pass inserts in front of it and nothing else.
        assert_eq!(twice.matches("<cmdty:id>BHP</cmdty:id>").count(), 3);
        assert_eq!(twice.matches(STAMP).count(), 2);
    }

    #[test]
    fn failed_fetch_inserts_nothing_and_is_not_retried() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[]));
        let r1 = record::render("XYZ", OLD_STAMP, "1");
        let r2 = record::render("XYZ", "2020-01-13 10:00:00 +1100", "2");
        let input = book(&[r1, r2]);

        let (changed, out) = run(&mut fetcher, &input);
        assert!(!changed);
        assert_eq!(out, input);
        assert_eq!(fetcher.source().calls(), 1);
    }

    #[test]
    fn other_exchanges_are_left_alone() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let nyse = record::render("BHP", OLD_STAMP, "44").replace(">ASX<", ">NYSE<");
        let input = book(&[nyse]);

        let (changed, out) = run(&mut fetcher, &input);
        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn unterminated_record_is_kept() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("BHP", 45.235)]));
        let old = record::render("BHP", OLD_STAMP, "44");
        let cut = &old[..old.len() - "  </price>\n".len()];
        let input = format!("<gnc-v2>\n{cut}");

        let (changed, out) = run(&mut fetcher, &input);
        // The id was read before the cut, so a price still goes in first
        assert!(changed);
        assert_eq!(out, format!("<gnc-v2>\n{}{cut}", record::render("BHP", STAMP, "9047/200")));
    }

    #[test]
    fn zero_price_is_written() {
        let mut fetcher = PriceFetcher::new(StubQuotes::new(&[("DEAD", 0.0)]));
        let input = book(&[record::render("DEAD", OLD_STAMP, "1")]);

        let (changed, out) = run(&mut fetcher, &input);
        assert!(changed);
        assert!(out.contains("<price:value>0</price:value>"));
    }
}
