use anyhow::{Context, Result};
use log::{debug, error};
use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

/// Size of the input data set the experiments ran on. It only changes axis
/// ranges and a handful of per-scale constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    TenGb,
    OneTb,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::TenGb => write!(f, "10G"),
            Scale::OneTb => write!(f, "1T"),
        }
    }
}

impl FromStr for Scale {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Scale, Self::Err> {
        match input.trim() {
            "10" => Ok(Scale::TenGb),
            "1000" => Ok(Scale::OneTb),
            other => {
                let reason = format!("unrecognized scale (scale={other}, expected 10 or 1000)");
                error!("{reason}");
                anyhow::bail!(reason)
            }
        }
    }
}

impl Scale {
    /// The integer that selects this scale in `scale.txt`.
    pub fn selector(&self) -> u32 {
        match self {
            Scale::TenGb => 10,
            Scale::OneTb => 1000,
        }
    }

    pub fn is_large(&self) -> bool {
        *self == Scale::OneTb
    }

    /// Read the scale selector from the first line of `path`.
    pub fn from_file(path: &Path) -> Result<Scale> {
        let file = File::open(path)
            .with_context(|| format!("error opening scale file (path={})", path.display()))?;
        let mut first_line = String::new();
        BufReader::new(file)
            .read_line(&mut first_line)
            .with_context(|| format!("error reading scale file (path={})", path.display()))?;

        let scale: Scale = first_line
            .parse()
            .with_context(|| format!("bad scale file (path={})", path.display()))?;
        debug!("read scale {scale} from {}", path.display());

        Ok(scale)
    }
}
