use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_crate::de::DeserializeOwned;
use serde_crate::Serialize;
use tracing::debug;

use crate::{Mlp, MlpError};
use playground_helpers::Float;

impl<F> Mlp<F>
where
    F: Float + Serialize + DeserializeOwned,
{
    /// Writes the network as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MlpError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), layers = self.layers.len(), "saved model");
        Ok(())
    }

    /// Reads a network written by [`Mlp::save`] and checks that its layer
    /// shapes chain together.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MlpError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.validate()?;
        debug!(
            path = %path.display(),
            input = model.input_dim(),
            output = model.output_dim(),
            "loaded model"
        );
        Ok(model)
    }
}
