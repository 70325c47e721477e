use std::{
    io::{Read, Result, Write},
    path::Path,
};

use crate::fs::Filesystem;

pub trait Saveable
where
    Self: Sized,
{
    fn load<I: Read>(reader: I) -> Result<Self>;
    fn save<O: Write>(&self, writer: O) -> Result<()>;

    /// Serialize into memory, then hand the bytes to `fs` in one write.
    fn save_to(&self, fs: &dyn Filesystem, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        self.save(&mut buf)?;
        fs.write(path, &buf)
    }

    fn load_from(fs: &dyn Filesystem, path: &Path) -> Result<Self> {
        let bytes = fs.read(path)?;
        Self::load(bytes.as_slice())
    }
}
