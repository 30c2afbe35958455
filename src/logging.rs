//! Log setup. reqwest errors embed request URLs, and both APIs carry
//! credentials in the URL, so everything written to stderr is masked.

use std::{
    borrow::Cow,
    io::{self, Write},
};

use lazy_static::lazy_static;
use regex::Regex;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, EnvFilter};

lazy_static! {
    static ref BOT_TOKEN: Regex = Regex::new(r"bot[0-9]{5,}:[A-Za-z0-9_-]+").unwrap();
    static ref ACCESS_TOKEN: Regex = Regex::new(r"access_token=[^&\s]+").unwrap();
}

/// Mask Telegram bot tokens and VK access tokens.
pub fn redact(input: &str) -> Cow<'_, str> {
    let out = BOT_TOKEN.replace_all(input, "bot[TELEGRAM_TOKEN]");

    if !ACCESS_TOKEN.is_match(&out) {
        return out;
    }

    Cow::Owned(ACCESS_TOKEN.replace_all(&out, "access_token=[MASKED]").into_owned())
}

pub struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // report the caller's length, the masked text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<F> RedactingMakeWriter<F> {
    pub fn new(make_inner: F) -> Self {
        Self { make_inner }
    }
}

impl<'a, F, W> MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

/// Install the global subscriber. Filter comes from `RUST_LOG`, default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter::new(io::stderr)))
        .init();
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn masks_bot_token_in_url() {
        let line = "error sending request for url (https://api.telegram.org/bot123456789:AAH-x_yZ/sendMessage)";
        assert_eq!(
            redact(line),
            "error sending request for url (https://api.telegram.org/bot[TELEGRAM_TOKEN]/sendMessage)"
        );
    }

    #[test]
    fn masks_vk_access_token() {
        let line = "https://api.vk.com/method/wall.get?owner_id=-1&access_token=vk1.a.secret&v=5.131";
        assert_eq!(
            redact(line),
            "https://api.vk.com/method/wall.get?owner_id=-1&access_token=[MASKED]&v=5.131"
        );
    }

    #[test]
    fn clean_text_is_borrowed() {
        assert!(matches!(redact("new post post_id=5"), Cow::Borrowed(_)));
    }

    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_masks_before_forwarding() {
        let sink = Sink::default();
        let make = {
            let sink = sink.clone();
            RedactingMakeWriter::new(move || sink.clone())
        };

        let msg = b"GET /method/wall.get?access_token=abc&count=10\n";
        let written = make.make_writer().write(msg).unwrap();

        assert_eq!(written, msg.len());
        assert_eq!(
            String::from_utf8(sink.0.borrow().clone()).unwrap(),
            "GET /method/wall.get?access_token=[MASKED]&count=10\n"
        );
    }
}
