//! Plain-text parameter files.
//!
//! Each tensor takes two lines: its dimensions, then its elements, both
//! separated by single spaces. Tensors are written and read back in the
//! order of the slice passed in.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::{error::TensorError, shape::Shape, tensor::Tensor};

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn save_parameters<W: Write>(mut writer: W, params: &[&Tensor]) -> Result<(), TensorError> {
    for param in params {
        writeln!(writer, "{}", join(param.shape().dims().iter()))?;
        writeln!(writer, "{}", join(param.data().iter()))?;
    }
    writer.flush()?;
    log::debug!("saved {} parameter tensor(s)", params.len());
    Ok(())
}

struct Lines<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> Lines<R> {
    fn next(&mut self) -> Result<&str, TensorError> {
        self.buf.clear();
        self.line += 1;
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Err(TensorError::Parse {
                line: self.line,
                why: "unexpected end of file".into(),
            });
        }
        Ok(self.buf.trim())
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<Vec<T>, TensorError> {
        let line = self.line + 1;
        let text = self.next()?;
        text.split_whitespace()
            .map(|tok| {
                tok.parse().map_err(|_| TensorError::Parse {
                    line,
                    why: format!("bad {what} {tok:?}"),
                })
            })
            .collect()
    }
}

/// Reads values written by [`save_parameters`] into `params`, reshaping
/// each one to the stored shape.
///
/// Every tensor is parsed and checked before any parameter is touched, so a
/// failed load leaves `params` unchanged.
///
/// # Errors
/// Parse errors carry the 1-based line number. A stored tensor whose element
/// count differs from the target's is a [`TensorError::ShapeMismatch`].
pub fn load_parameters<R: BufRead>(reader: R, params: &[&Tensor]) -> Result<(), TensorError> {
    let mut lines = Lines {
        reader,
        line: 0,
        buf: String::new(),
    };
    let mut staged = Vec::with_capacity(params.len());
    for param in params {
        let shape = Shape::from(lines.parse::<usize>("dimension")?);
        let values = lines.parse::<f32>("value")?;
        if shape.try_numel() != Some(values.len()) {
            return Err(TensorError::Parse {
                line: lines.line,
                why: format!("{} value(s) for {shape}", values.len()),
            });
        }
        if values.len() != param.numel() {
            return Err(TensorError::mismatch("load", &param.shape(), &shape));
        }
        staged.push((shape, values));
    }
    for (param, (shape, values)) in params.iter().zip(staged) {
        param.view(shape)?;
        param.data_mut().copy_from_slice(&values);
    }
    log::debug!("loaded {} parameter tensor(s)", params.len());
    Ok(())
}

pub fn save_to_path(path: impl AsRef<Path>, params: &[&Tensor]) -> Result<(), TensorError> {
    let file = File::create(path.as_ref())?;
    save_parameters(BufWriter::new(file), params)
}

pub fn load_from_path(path: impl AsRef<Path>, params: &[&Tensor]) -> Result<(), TensorError> {
    let file = File::open(path.as_ref())?;
    load_parameters(BufReader::new(file), params)
}
