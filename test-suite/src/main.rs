use anyhow::{anyhow, Context, Result};
use glob::glob;
use std::result::Result as StdResult;

use std::fs;
use std::process::Command;

fn main() -> Result<()> {
    compile_rill().context("compiling interpreter")?;

    let scripts: Vec<_> = glob("tests/*.rl")?.collect::<StdResult<_, _>>()?;
    let mut failures = 0;
    for script in &scripts {
        let expected_path = format!(
            "tests/{}.out",
            script.file_stem().unwrap().to_str().unwrap()
        );
        let expected = fs::read_to_string(&expected_path)
            .context(format!("loading expected output: {}", &expected_path))?;
        let output_bytes = Command::new("../target/release/rill")
            .arg(script)
            .output()
            .context(format!("running script {}", script.display()))?
            .stdout;
        let output = String::from_utf8(output_bytes)?;
        if output == expected {
            println!("{}: passed", script.display());
        } else {
            println!("{}: failed\nactual output:\n{}", script.display(), output);
            failures += 1;
        }
    }
    if failures == 0 {
        Ok(())
    } else {
        Err(anyhow!("{} of {} scripts failed", failures, scripts.len()))
    }
}

fn compile_rill() -> Result<()> {
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .current_dir("../interpreter")
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("building the interpreter failed"))
    }
}
