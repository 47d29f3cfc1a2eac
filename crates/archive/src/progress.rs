use std::io::{self, Read};

/// Counts bytes read and remembers whether the source itself failed
///
/// Payload copies go through this so an aborted operation can report the
/// bytes moved before the failure, and so a read error can be told apart
/// from a write error on the other side of the copy.
pub(crate) struct ProgressReader<R> {
    inner: R,
    count: u64,
    read_failed: bool,
}

impl<R: Read> ProgressReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            count: 0,
            read_failed: false,
        }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn read_failed(&self) -> bool {
        self.read_failed
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                self.count += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    self.read_failed = true;
                }
                Err(e)
            }
        }
    }
}
