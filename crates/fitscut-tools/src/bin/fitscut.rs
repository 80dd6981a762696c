use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use fitscut::{cutout, parse_fits, write_fits, CutoutOptions, CutoutSpecification};
use flexi_logger::Logger;
use log::{debug, info};

/// Cut sub-images out of FITS files, keeping their WCS consistent.
#[derive(Parser, Debug)]
#[command(name = "fitscut")]
#[command(version, about)]
struct Cli {
    /// Cutout specifications, e.g. '[1][10:40,*]' or 'CIRCLE 150.1 2.2 0.05 POL I'.
    #[arg(required = true)]
    cutouts: Vec<String>,

    /// FITS file to read ('-' for stdin).
    #[arg(long, default_value = "-")]
    infile: PathBuf,

    /// Where to write the result ('-' for stdout).
    #[arg(long, default_value = "-")]
    outfile: PathBuf,

    /// Write CDi_j matrices as PCi_j.
    #[arg(long, env = "FITSCUT_PREFER_PC")]
    prefer_pc: bool,

    /// Log level; RUST_LOG takes precedence.
    #[arg(long, env = "FITSCUT_LOG", default_value = "warn")]
    log_level: String,
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if is_stdio(path) {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path)
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if is_stdio(path) {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    } else {
        fs::write(path, bytes)
    }
}

fn run(cli: &Cli) -> fitscut::Result<()> {
    let spec = CutoutSpecification::parse_all(&cli.cutouts)?;
    debug!("parsed request: {spec:?}");
    let options = CutoutOptions {
        prefer_pc: cli.prefer_pc,
        ..CutoutOptions::default()
    };

    let input = read_input(&cli.infile)?;
    let fits = parse_fits(&input)?;
    info!("read {} HDUs from {}", fits.hdus.len(), cli.infile.display());

    let hdus = cutout(&spec, &fits.hdus, &options)?;
    let bytes = write_fits(&hdus)?;
    write_output(&cli.outfile, &bytes)?;
    info!("wrote {} HDUs ({} bytes) to {}", hdus.len(), bytes.len(), cli.outfile.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let logger = Logger::try_with_env_or_str(&cli.log_level).and_then(|l| l.log_to_stderr().start());
    let _logger = match logger {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("fitscut: cannot start logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&cli) {
        eprintln!("fitscut: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_stdio() {
        let cli = Cli::try_parse_from(["fitscut", "[1][1:10,*]"]).unwrap();
        assert!(is_stdio(&cli.infile));
        assert!(is_stdio(&cli.outfile));
        assert!(!cli.prefer_pc);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn several_cutouts() {
        let cli = Cli::try_parse_from([
            "fitscut",
            "--infile",
            "in.fits",
            "--prefer-pc",
            "CIRCLE 1 2 0.1",
            "POL I",
        ])
        .unwrap();
        assert_eq!(cli.cutouts, vec!["CIRCLE 1 2 0.1", "POL I"]);
        assert_eq!(cli.infile, PathBuf::from("in.fits"));
        assert!(cli.prefer_pc);
    }

    #[test]
    fn cutout_is_required() {
        assert!(Cli::try_parse_from(["fitscut"]).is_err());
    }
}
