//! Pin option tokens, parsed destructively from caller-owned storage.
//!
//! A pin specification looks like `gpio.16:pu:low`: a head token selecting
//! the backend and channel, then `:`-separated options, each a bare flag or a
//! `key=value` pair. The parser lowercases the buffer in place and hands out
//! subslices, so nothing is allocated and the caller must keep the buffer
//! alive for as long as the options are used.

/// One option token. Holds a slice of the (already lowercased) spec buffer.
#[derive(Debug, Clone, Copy)]
pub struct PinOption<'a> {
    token: &'a str,
}

impl<'a> PinOption<'a> {
    /// Exact, case-insensitive-by-construction match on the option key.
    pub fn is(&self, option: &str) -> bool {
        self.key() == option
    }

    pub fn key(&self) -> &'a str {
        match self.token.split_once('=') {
            Some((key, _)) => key,
            None => self.token,
        }
    }

    /// The part after `=`, empty for a bare flag.
    pub fn value(&self) -> &'a str {
        match self.token.split_once('=') {
            Some((_, value)) => value,
            None => "",
        }
    }

    pub fn token(&self) -> &'a str {
        self.token
    }
}

/// Forward-only, non-restartable sequence of [`PinOption`] values.
pub struct PinOptionsParser<'a> {
    rest: &'a str,
}

impl<'a> PinOptionsParser<'a> {
    /// Lowercases the option region in place and takes ownership of its
    /// traversal.
    pub fn new(buffer: &'a mut str) -> Self {
        buffer.make_ascii_lowercase();
        Self { rest: buffer }
    }

    pub(crate) fn empty() -> Self {
        Self { rest: "" }
    }
}

impl<'a> Iterator for PinOptionsParser<'a> {
    type Item = PinOption<'a>;

    fn next(&mut self) -> Option<PinOption<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        let (token, rest) = match self.rest.split_once(':') {
            Some((token, rest)) => (token, rest),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some(PinOption { token })
    }
}

/// Splits a full pin specification into its head token (`backend` or
/// `backend.index`) and the option sequence, lowercasing the whole buffer in
/// place first.
pub(crate) fn split_spec(buffer: &mut str) -> (&str, PinOptionsParser<'_>) {
    match buffer.find(':') {
        Some(pos) => {
            let (head, rest) = buffer.split_at_mut(pos);
            head.make_ascii_lowercase();
            (head, PinOptionsParser::new(&mut rest[1..]))
        }
        None => {
            buffer.make_ascii_lowercase();
            (buffer, PinOptionsParser::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_in_place() {
        let mut buf = String::from("PU:LOW");
        let opts: Vec<String> = PinOptionsParser::new(&mut buf)
            .map(|o| o.token().to_string())
            .collect();
        assert_eq!(opts, ["pu", "low"]);
        assert_eq!(buf, "pu:low");
    }

    #[test]
    fn bare_flags_and_key_value_pairs() {
        let mut buf = String::from("low:freq=5000:init_on");
        let mut opts = PinOptionsParser::new(&mut buf);

        let first = opts.next().unwrap();
        assert!(first.is("low"));
        assert_eq!(first.value(), "");

        let second = opts.next().unwrap();
        assert!(second.is("freq"));
        assert_eq!(second.value(), "5000");

        let third = opts.next().unwrap();
        assert!(third.is("init_on"));
        assert!(opts.next().is_none());
    }

    #[test]
    fn empty_region_yields_nothing() {
        let mut buf = String::new();
        assert!(PinOptionsParser::new(&mut buf).next().is_none());
    }

    #[test]
    fn splits_head_from_options() {
        let mut buf = String::from("GPIO.16:PU:low");
        let (head, opts) = split_spec(&mut buf);
        assert_eq!(head, "gpio.16");
        let tokens: Vec<&str> = opts.map(|o| o.token()).collect();
        assert_eq!(tokens, ["pu", "low"]);
    }

    #[test]
    fn head_only_spec_has_no_options() {
        let mut buf = String::from("NULL");
        let (head, mut opts) = split_spec(&mut buf);
        assert_eq!(head, "null");
        assert!(opts.next().is_none());
    }
}
