//! gnuplot script generation.

use atts_core::RenderError;
use atts_core::report::GraphSpec;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Plot of one graph: `<prefix>.dat` is read, `<prefix>.plot` is the
/// script and `<prefix>.png` the image.
#[derive(Debug, Clone)]
pub struct PlotScript<'a> {
    spec: &'a GraphSpec,
    prefix: PathBuf,
}

impl<'a> PlotScript<'a> {
    pub fn new(spec: &'a GraphSpec, prefix: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            prefix: prefix.into(),
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.with_extension("dat")
    }

    pub fn script_path(&self) -> PathBuf {
        self.with_extension("plot")
    }

    pub fn image_path(&self) -> PathBuf {
        self.with_extension("png")
    }

    fn with_extension(&self, ext: &str) -> PathBuf {
        let mut path = self.prefix.clone().into_os_string();
        path.push(".");
        path.push(ext);
        PathBuf::from(path)
    }

    /// Script text.
    pub fn script(&self) -> String {
        let mut script = String::from("set terminal png size 1024,320\n");
        if let Some(label) = &self.spec.y_label {
            script.push_str(&format!("set ylabel \"{}\"\n", quote(label)));
        }
        if let Some(label) = &self.spec.x_label {
            script.push_str(&format!("set xlabel \"{}\"\n", quote(label)));
        }
        // Date values occupy columns 1 and 2, so y moves to column 3.
        let columns = if self.spec.date_x_axis {
            script.push_str("set xdata time\n");
            script.push_str("set timefmt \"%Y-%m-%d %H:%M:%S\"\n");
            "1:3"
        } else {
            "1:2"
        };
        script.push_str(&format!(
            "set output \"{}\"\n",
            quote(&self.image_path().display().to_string())
        ));
        script.push_str(&format!(
            "plot '{}' using {} title '{}' with linespoints\n",
            self.data_path().display(),
            columns,
            self.spec.name.replace('\'', "")
        ));
        script
    }

    /// Writes the script, replacing any stale script and image.
    pub fn write(&self) -> io::Result<PathBuf> {
        remove_if_exists(&self.image_path())?;
        let path = self.script_path();
        std::fs::write(&path, self.script())?;
        Ok(path)
    }

    /// Writes the script and runs `gnuplot` on it.
    ///
    /// Returns the image path, or `None` when the gnuplot binary is not
    /// installed.
    pub fn render(&self, gnuplot: &str) -> Result<Option<PathBuf>, RenderError> {
        let script = self.write()?;
        debug!("Running {} {}", gnuplot, script.display());
        let output = match Command::new(gnuplot).arg(&script).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} not found, skipping plot {}", gnuplot, script.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if !output.status.success() {
            return Err(RenderError::Plot(format!(
                "{} exited with {}: {}",
                gnuplot,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(Some(self.image_path()))
    }
}

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
