use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::MisraError;

pub const EXAMPLE_FILE_NAME: &str = "misra_example_config.json";

pub const EXAMPLE_CONFIG: &str = r#"{
  "experiments": "SRX2183553,SRX2183554",
  "mode": "mirna",
  "mature": "mature.fa",
  "hairpin": "hairpin.fa",
  "alignType": "n",
  "mm": 0,
  "max": 10,
  "minRC": 2,
  "localOut": "misra_results"
}
"#;

pub const ANNOTATED_CONFIG: &str = r#"{
  // Scope: at least one of experiments, studies or taxonID (comma separated)
  "experiments": "SRX2183553,SRX2183554",   // SRX/ERX/DRX sample accessions
  // "studies": "SRP045475",                // SRP/ERP/DRP study accessions
  // "taxonID": "9606",                     // NCBI taxonomy id

  // Analysis mode and the reference files it needs:
  //   mirna    -> mature, hairpin
  //   spike    -> spikeFile (alias: exact)
  //   libs     -> libs
  //   libsG    -> libs
  //   download -> none (optional sep, minReadLength, maxReadLength)
  "mode": "mirna",
  "mature": "mature.fa",
  "hairpin": "hairpin.fa",

  // Alignment options
  "alignType": "n",   // alignment type
  "mm": 0,            // allowed mismatches
  "max": 10,          // maximum number of mapping locations per read
  "minRC": 2,         // minimum read count

  // Local output directory (default: misra_results)
  "localOut": "misra_results"
}

Key=value configs (file extension .txt) take the same keys, one per line:
  experiments=SRX2183553,SRX2183554
  mode=mirna
"#;

pub fn write_example(directory: &Utf8Path) -> Result<Utf8PathBuf, MisraError> {
    let path = directory.join(EXAMPLE_FILE_NAME);
    fs::write(path.as_std_path(), EXAMPLE_CONFIG)
        .map_err(|err| MisraError::Filesystem(format!("write {path}: {err}")))?;
    Ok(path)
}
