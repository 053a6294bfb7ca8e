//! # record
//!
//! The GnuCash price record this program writes, and the line matcher that finds
//! existing records of the same shape in a book.
//!
//! A record looks like this (indentation is significant, it is matched exactly):
//! ```text
//!   <price>
//!     <price:commodity>
//!       <cmdty:space>ASX</cmdty:space>
//!       <cmdty:id>BHP</cmdty:id>
//!     </price:commodity>
//!     ...
//!   </price>
//! ```
//!
//! The book is never parsed as XML. The matcher only looks at whole lines and
//! hands every line back untouched, so anything it does not recognise is copied
//! through byte for byte.

use chrono::Local;

/// First line of a price record.
pub const START_MARKER: &[u8] = b"  <price>";
/// The line just before the commodity id.
pub const CODE_MARKER: &[u8] = b"      <cmdty:space>ASX</cmdty:space>";
/// Last line of a price record.
pub const END_MARKER: &[u8] = b"  </price>";

/// Renders a complete price record for `code`, newline terminated.
pub fn render(code: &str, stamp: &str, price: &str) -> String {
    format!(
        "  <price>
    <price:commodity>
      <cmdty:space>ASX</cmdty:space>
      <cmdty:id>{code}</cmdty:id>
    </price:commodity>
    <price:currency>
      <cmdty:space>CURRENCY</cmdty:space>
      <cmdty:id>AUD</cmdty:id>
    </price:currency>
    <price:time>
      <ts:date>{stamp}</ts:date>
    </price:time>
    <price:source>Finance::Quote</price:source>
    <price:type>last</price:type>
    <price:value>{price}</price:value>
  </price>
"
    )
}

/// Local time in the form GnuCash stores it, e.g. `2020-01-15 14:30:05 +1100`.
/// Taken once per run so every inserted record carries the same time.
pub fn run_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string()
}

/// What the matcher did with a line.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Not part of any record, write it out unchanged.
    Pass(Vec<u8>),
    /// Held in the current block.
    Buffered,
    /// The commodity id line of the current block was read (and held).
    /// `None` if no id could be pulled out of it.
    Code(Option<String>),
    /// The block is complete. Holds every line of it exactly as read.
    End(Vec<u8>),
}

/// Line by line recogniser for price records.
///
/// Lines are passed in with their terminators still attached; only the comparison
/// ignores trailing whitespace.
#[derive(Debug, Default)]
pub struct Matcher {
    block: Vec<u8>,
    code_next: bool,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw line to the matcher.
    pub fn feed(&mut self, line: Vec<u8>) -> Event {
        let content = line.trim_ascii_end();

        if self.block.is_empty() {
            if content != START_MARKER {
                return Event::Pass(line);
            }
            self.block.extend_from_slice(&line);
            return Event::Buffered;
        }

        if self.code_next {
            self.code_next = false;
            let code = extract_code(content);
            self.block.extend_from_slice(&line);
            return Event::Code(code);
        }

        if content == END_MARKER {
            self.block.extend_from_slice(&line);
            return Event::End(std::mem::take(&mut self.block));
        }

        if content == CODE_MARKER {
            self.code_next = true;
        }
        self.block.extend_from_slice(&line);
        Event::Buffered
    }

    /// Hands back a block that was still open at end of input.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.code_next = false;
        if self.block.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.block))
        }
    }
}

/// Text between the first `>` and the following `<`.
fn extract_code(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?;
    let (_, rest) = text.split_once('>')?;
    let (code, _) = rest.split_once('<')?;
    if code.is_empty() {
        return None;
    }
    Some(code.to_string())
}
