use std::io::{self, Write};

/// A writer that runs a callback before every forwarded write.
///
/// One call to [`Write::write`] fires the callback exactly once and then
/// hands the same bytes to the inner writer. The callback cannot fail the
/// write; it must deal with its own errors. Flushing does not fire it.
pub struct WriteTrigger<W, F> {
	writer: W,
	trigger: F,
}

impl<W, F> WriteTrigger<W, F>
where
	W: Write,
	F: FnMut(),
{
	pub fn new(writer: W, trigger: F) -> Self {
		Self { writer, trigger }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl<W, F> Write for WriteTrigger<W, F>
where
	W: Write,
	F: FnMut(),
{
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		(self.trigger)();
		self.writer.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.writer.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;

	#[test]
	fn test_each_write_fires_once_before_forwarding() {
		let fired = Cell::new(0);
		let mut sink = WriteTrigger::new(Vec::new(), || fired.set(fired.get() + 1));

		assert_eq!(sink.write(b"tunnel up\n").unwrap(), 10);
		assert_eq!(fired.get(), 1);
		assert_eq!(sink.write(b"\x00\xffraw").unwrap(), 5);
		assert_eq!(fired.get(), 2);

		sink.flush().unwrap();
		assert_eq!(fired.get(), 2);
		assert_eq!(sink.into_inner(), b"tunnel up\n\x00\xffraw".to_vec());
	}

	#[test]
	fn test_callback_runs_before_bytes_arrive() {
		struct Probe<'a>(&'a Cell<usize>, Vec<usize>);
		impl Write for Probe<'_> {
			fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
				self.1.push(self.0.get());
				Ok(buf.len())
			}
			fn flush(&mut self) -> io::Result<()> {
				Ok(())
			}
		}

		let fired = Cell::new(0);
		let mut sink = WriteTrigger::new(Probe(&fired, Vec::new()), || fired.set(fired.get() + 1));
		sink.write_all(b"a").unwrap();
		sink.write_all(b"b").unwrap();

		assert_eq!(sink.into_inner().1, vec![1, 2]);
	}

	#[test]
	fn test_inner_error_is_returned_after_trigger() {
		struct Broken;
		impl Write for Broken {
			fn write(&mut self, _: &[u8]) -> io::Result<usize> {
				Err(io::Error::from(io::ErrorKind::BrokenPipe))
			}
			fn flush(&mut self) -> io::Result<()> {
				Ok(())
			}
		}

		let fired = Cell::new(false);
		let mut sink = WriteTrigger::new(Broken, || fired.set(true));
		let err = sink.write(b"x").unwrap_err();

		assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
		assert!(fired.get());
	}
}
