use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

const WASM_TARGET: &str = "wasm32-unknown-unknown";
const EXTENSION_PACKAGE: &str = "stellar-wallet-extension";
const DIST_DIR: &str = "extension/dist";
const STATIC_DIR: &str = "extension/static";

/// wasm-bindgen output flavour per artifact. Service worker and content
/// script can't load ES modules, the page and popup can.
const ARTIFACTS: &[(&str, &str)] = &[
    ("background", "no-modules"),
    ("content", "no-modules"),
    ("provider", "web"),
    ("stellar_wallet_extension", "web"),
];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Stellar Wallet task runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the extension into extension/dist
    Build {
        /// Debug build (faster, larger)
        #[arg(long)]
        dev: bool,
    },

    /// Run tests
    Test {
        #[command(subcommand)]
        test_type: Option<TestType>,
    },

    /// Run clippy linter
    Clippy,

    /// Remove build output
    Clean,
}

#[derive(Subcommand)]
enum TestType {
    /// Core library only
    Core,

    /// Run all Rust tests
    Unit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dev } => build(dev),
        Commands::Test { test_type } => test(test_type),
        Commands::Clippy => clippy(),
        Commands::Clean => clean(),
    }
}

fn build(dev: bool) -> Result<()> {
    let profile = if dev { "debug" } else { "release" };
    println!("🔨 Building {} ({})...", EXTENSION_PACKAGE, profile);

    let mut args = vec!["build", "-p", EXTENSION_PACKAGE, "--target", WASM_TARGET];
    if !dev {
        args.push("--release");
    }
    // lib (popup) plus every entry binary
    args.extend(["--lib", "--bins"]);
    run_cmd("cargo", &args)?;

    let pkg_dir = format!("{}/pkg", DIST_DIR);
    fs::create_dir_all(&pkg_dir).with_context(|| format!("Failed to create {}", pkg_dir))?;

    for (name, target) in ARTIFACTS {
        let wasm = format!("target/{}/{}/{}.wasm", WASM_TARGET, profile, name);
        println!("📦 wasm-bindgen {} ({})", name, target);
        run_cmd(
            "wasm-bindgen",
            &[
                wasm.as_str(),
                "--out-dir",
                pkg_dir.as_str(),
                "--target",
                target,
                "--no-typescript",
            ],
        )?;
    }

    copy_static(Path::new(STATIC_DIR), Path::new(DIST_DIR))?;

    println!();
    println!("✅ Extension ready in {}", DIST_DIR);
    println!("   Load it via chrome://extensions → Load unpacked");
    Ok(())
}

fn copy_static(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from).with_context(|| format!("Failed to read {}", from.display()))? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        fs::copy(entry.path(), &dest)
            .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        println!("  ✅ {}", dest.display());
    }
    Ok(())
}

fn test(test_type: Option<TestType>) -> Result<()> {
    match test_type {
        Some(TestType::Core) => {
            println!("🧪 Testing wallet core...");
            run_cmd("cargo", &["test", "-p", "stellar-wallet-core"])?;
        }
        Some(TestType::Unit) | None => {
            // the extension crate only builds for wasm32
            println!("🧪 Running all tests...");
            run_cmd(
                "cargo",
                &["test", "--workspace", "--exclude", EXTENSION_PACKAGE],
            )?;
        }
    }
    Ok(())
}

fn clippy() -> Result<()> {
    println!("🔍 Running clippy on workspace (warnings as errors)...");
    run_cmd(
        "cargo",
        &[
            "clippy",
            "--workspace",
            "--exclude",
            EXTENSION_PACKAGE,
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )?;

    println!("🔍 Running clippy on the extension ({})...", WASM_TARGET);
    run_cmd(
        "cargo",
        &[
            "clippy",
            "-p",
            EXTENSION_PACKAGE,
            "--target",
            WASM_TARGET,
            "--",
            "-D",
            "warnings",
        ],
    )?;
    Ok(())
}

fn clean() -> Result<()> {
    println!("🧹 Removing {}...", DIST_DIR);
    // Ignore error if it doesn't exist
    let _ = fs::remove_dir_all(DIST_DIR);

    run_cmd("cargo", &["clean"])?;
    Ok(())
}

// Helper functions
fn run_cmd(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to run: {} {}", program, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", program, args.join(" "));
    }

    Ok(())
}
