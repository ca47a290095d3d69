use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use crate::error::SimError;

/// The bytes of a trace file, either memory mapped or read into memory
pub enum TraceBuffer {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Loaded(Vec<u8>),
}

impl Deref for TraceBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBuffer::Mapped(m) => m,
            TraceBuffer::Loaded(v) => v,
        }
    }
}

/// Opens a trace file for replay
pub fn open_trace(path: impl AsRef<Path>) -> Result<TraceBuffer, SimError> {
    let file = File::open(path)?;
    // Mapping an empty file fails on some systems
    if file.metadata()?.len() == 0 {
        return Ok(TraceBuffer::Loaded(Vec::new()));
    }
    read_trace(file)
}

fn read_trace(file: File) -> Result<TraceBuffer, SimError> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::{BufReader, Read};
        let mut buf = Vec::new();
        BufReader::new(file).read_to_end(&mut buf)?;
        Ok(TraceBuffer::Loaded(buf))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // SAFETY: the map is read only, and the trace isn't expected to change while it is replayed
        let m = unsafe { Mmap::map(&file)? };
        m.advise(Advice::Sequential)?;
        Ok(TraceBuffer::Mapped(m))
    }
}
