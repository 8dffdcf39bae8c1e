//! Python pickle (protocol 2) writer for the Carbon pickle receiver.
//!
//! Covers the object subset Carbon accepts: a list of `(name, (timestamp, value))` tuples. The output
//! is the same as CPython's `pickle.dumps(obj, protocol=2)`, including memo opcodes and list batching.

use crate::error::Error;

const PROTO: u8 = 0x80;
const STOP: u8 = b'.';
const MARK: u8 = b'(';
const EMPTY_LIST: u8 = b']';
const APPEND: u8 = b'a';
const APPENDS: u8 = b'e';
const TUPLE2: u8 = 0x86;
const BININT: u8 = b'J';
const BININT1: u8 = b'K';
const BININT2: u8 = b'M';
const LONG1: u8 = 0x8a;
const BINFLOAT: u8 = b'G';
const BINUNICODE: u8 = b'X';
const BINPUT: u8 = b'q';
const LONG_BINPUT: u8 = b'r';

const BATCH_SIZE: usize = 1000;

pub fn dumps(metrics: &[(String, (i64, f64))]) -> Result<Vec<u8>, Error> {
    let mut pickler = Pickler::new();
    pickler.save_metrics(metrics)?;
    Ok(pickler.finish())
}

/// 32-bit length field used both inside the pickle and for the Carbon frame header.
pub fn length(size: usize) -> Result<u32, Error> {
    u32::try_from(size).map_err(|_| Error::TooLarge(size))
}

struct Pickler {
    buf: Vec<u8>,
    memo: u32,
}

impl Pickler {
    fn new() -> Pickler {
        Pickler {
            buf: vec![PROTO, 2],
            memo: 0,
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf.push(STOP);
        self.buf
    }

    fn save_metrics(&mut self, metrics: &[(String, (i64, f64))]) -> Result<(), Error> {
        self.buf.push(EMPTY_LIST);
        self.memoize();

        if let [metric] = metrics {
            self.save_metric(metric)?;
            self.buf.push(APPEND);
            return Ok(());
        }

        for batch in metrics.chunks(BATCH_SIZE) {
            self.buf.push(MARK);
            for metric in batch {
                self.save_metric(metric)?;
            }
            self.buf.push(APPENDS);
        }

        Ok(())
    }

    fn save_metric(&mut self, (name, (timestamp, value)): &(String, (i64, f64))) -> Result<(), Error> {
        self.save_str(name)?;
        self.save_int(*timestamp);
        self.save_float(*value);
        self.save_tuple2();
        self.save_tuple2();
        Ok(())
    }

    fn save_tuple2(&mut self) {
        self.buf.push(TUPLE2);
        self.memoize();
    }

    fn save_str(&mut self, value: &str) -> Result<(), Error> {
        let size = length(value.len())?;

        self.buf.push(BINUNICODE);
        self.buf.extend(size.to_le_bytes());
        self.buf.extend(value.as_bytes());
        self.memoize();

        Ok(())
    }

    fn save_int(&mut self, value: i64) {
        if let Ok(value) = u8::try_from(value) {
            self.buf.extend([BININT1, value]);
        } else if let Ok(value) = u16::try_from(value) {
            self.buf.push(BININT2);
            self.buf.extend(value.to_le_bytes());
        } else if let Ok(value) = i32::try_from(value) {
            self.buf.push(BININT);
            self.buf.extend(value.to_le_bytes());
        } else {
            let bytes = encode_long(value);
            self.buf.extend([LONG1, bytes.len() as u8]);
            self.buf.extend(bytes);
        }
    }

    fn save_float(&mut self, value: f64) {
        self.buf.push(BINFLOAT);
        self.buf.extend(value.to_be_bytes());
    }

    fn memoize(&mut self) {
        if let Ok(index) = u8::try_from(self.memo) {
            self.buf.extend([BINPUT, index]);
        } else {
            self.buf.push(LONG_BINPUT);
            self.buf.extend(self.memo.to_le_bytes());
        }
        self.memo += 1;
    }
}

// Minimal little-endian two's complement representation.
fn encode_long(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let bit_length = 64 - value.unsigned_abs().leading_zeros() as usize;
    let size = bit_length / 8 + 1;

    let mut bytes = value.to_le_bytes().to_vec();
    bytes.resize(size, if value < 0 { 0xff } else { 0 });

    if value < 0 && size > 1 && bytes[size - 1] == 0xff && bytes[size - 2] & 0x80 != 0 {
        bytes.pop();
    }

    bytes
}
