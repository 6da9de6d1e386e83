use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use vfa::codec::Method;
use vfa::error::{PolicyError, VfaError};
use vfa::log::{Level, VfaLog};
use vfa::meta::CaptureOptions;
use vfa::writer::{AppendOptions, CreateOptions, KdfChoice};

#[derive(Parser)]
#[command(name = "vfa", version = "1.0.0", about = "Single-file archive format: pack, extract, and verify a tree of filesystem objects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct LogOpts {
    /// quiet|error|warning|info|debug|trace
    #[arg(long, default_value = "warning")]
    log_level: String,
    /// Shorthand for --log-level info
    #[arg(short, long)]
    verbose: bool,
}

impl LogOpts {
    fn logger(&self) -> VfaLog {
        let level = if self.verbose {
            Level::Info
        } else {
            Level::from_name(&self.log_level).unwrap_or(Level::Warning)
        };
        VfaLog::new(level)
    }
}

#[derive(clap::Args)]
struct CaptureArgs {
    #[arg(long)]
    winmeta: bool,
    #[arg(long)]
    posixmeta: bool,
    #[arg(long)]
    xattrs: bool,
    #[arg(long)]
    acl: bool,
    #[arg(long)]
    selinux: bool,
    #[arg(long)]
    sparse: bool,
}

impl CaptureArgs {
    fn options(&self) -> CaptureOptions {
        CaptureOptions {
            posix: self.posixmeta,
            xattrs: self.xattrs,
            acl: self.acl,
            selinux: self.selinux,
            sparse: self.sparse,
            win: self.winmeta,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an archive from one or more filesystem roots
    #[command(name = "c")]
    Create {
        out: PathBuf,
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value = "zstd")]
        method: String,
        #[arg(long, default_value = "5")]
        level: i32,
        #[arg(long = "block-exp", default_value = "22")]
        block_exp: u8,
        #[arg(long)]
        solid: bool,
        #[arg(long = "solid-chunk-exp")]
        solid_chunk_exp: Option<u8>,
        /// none|ext
        #[arg(long = "solid-by", default_value = "none")]
        solid_by: String,
        #[arg(long)]
        password: bool,
        #[command(flatten)]
        capture: CaptureArgs,
        #[arg(long = "kdf-time")]
        kdf_time: Option<u32>,
        #[arg(long = "kdf-mem-kib")]
        kdf_mem_kib: Option<u32>,
        #[arg(long = "kdf-parallel")]
        kdf_parallel: Option<u8>,
        #[arg(long = "scrypt-n")]
        scrypt_n: Option<u32>,
        #[arg(long = "scrypt-r")]
        scrypt_r: Option<u32>,
        #[arg(long = "scrypt-p")]
        scrypt_p: Option<u8>,
        #[command(flatten)]
        log: LogOpts,
    },
    /// Append files to an existing non-solid archive
    #[command(name = "a")]
    Append {
        archive: PathBuf,
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        level: Option<i32>,
        #[arg(long)]
        password: bool,
        #[command(flatten)]
        log: LogOpts,
    },
    /// List archive contents
    #[command(name = "l")]
    List {
        archive: PathBuf,
        #[arg(long)]
        password: bool,
        #[command(flatten)]
        log: LogOpts,
    },
    /// Verify archive integrity
    #[command(name = "t")]
    Test {
        archive: PathBuf,
        #[arg(long)]
        password: bool,
        #[command(flatten)]
        log: LogOpts,
    },
    /// Extract archive contents
    #[command(name = "x")]
    Extract {
        archive: PathBuf,
        #[arg(short = 'o', long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        password: bool,
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        log: LogOpts,
    },
}

fn read_password() -> Result<String, VfaError> {
    rpassword::prompt_password("Password: ").map_err(VfaError::Io)
}

fn kdf_choice(
    kdf_time: Option<u32>,
    kdf_mem_kib: Option<u32>,
    kdf_parallel: Option<u8>,
    scrypt_n: Option<u32>,
    scrypt_r: Option<u32>,
    scrypt_p: Option<u8>,
) -> KdfChoice {
    use vfa::crypto::KdfParams;
    if scrypt_n.is_some() || scrypt_r.is_some() || scrypt_p.is_some() {
        let d = KdfParams::default_scrypt();
        KdfChoice::Scrypt {
            n: scrypt_n.unwrap_or(d.t),
            r: scrypt_r.unwrap_or(d.m),
            p: scrypt_p.unwrap_or(d.p),
        }
    } else {
        let d = KdfParams::default_argon2id();
        KdfChoice::Argon2Id {
            t: kdf_time.unwrap_or(d.t),
            m: kdf_mem_kib.unwrap_or(d.m),
            p: kdf_parallel.unwrap_or(d.p),
        }
    }
}

fn run() -> Result<(), VfaError> {
    match Cli::parse().command {
        Commands::Create {
            out,
            inputs,
            method,
            level,
            block_exp,
            solid,
            solid_chunk_exp,
            solid_by,
            password,
            capture,
            kdf_time,
            kdf_mem_kib,
            kdf_parallel,
            scrypt_n,
            scrypt_r,
            scrypt_p,
            log,
        } => {
            let logger = log.logger();
            let method = Method::from_name(&method).unwrap_or(Method::Zstd);
            let password = if password { Some(read_password()?) } else { None };
            let opts = CreateOptions {
                method,
                level,
                block_exp,
                solid,
                solid_chunk_exp,
                solid_by_ext: solid_by.eq_ignore_ascii_case("ext"),
                password,
                capture: capture.options(),
                threads_hint: 0,
                ram_mib_hint: 0,
                kdf: kdf_choice(kdf_time, kdf_mem_kib, kdf_parallel, scrypt_n, scrypt_r, scrypt_p),
            };
            let summary = vfa::writer::create(&out, &inputs, &opts, &logger)?;
            println!("Created {} with {} entry(s). Solid={}", out.display(), summary.entries, summary.solid);
        }

        Commands::Append { archive, inputs, method, level, password, log } => {
            let logger = log.logger();
            let method = method.and_then(|m| Method::from_name(&m));
            let password = if password { Some(read_password()?) } else { None };
            let opts = AppendOptions { method, level, password };
            let summary = vfa::writer::append(&archive, &inputs, &opts, &logger)?;
            println!("Appended to {} — now {} entry(s).", archive.display(), summary.entries);
        }

        Commands::List { archive, password, log } => {
            let _logger = log.logger();
            let password = if password { Some(read_password()?) } else { None };
            let (header, toc) = vfa::reader::list(&archive, &password)?;
            println!("{:<40} {:>12} {:>5}  kind", "Path", "Size", "Blk");
            for e in &toc.entries {
                let kind = match e.kind {
                    vfa::Kind::File => "file",
                    vfa::Kind::Dir => "dir",
                    vfa::Kind::Symlink => "symlink",
                    vfa::Kind::HardLink => "hardlink",
                };
                println!("{:<40} {:>12} {:>5}  {kind}", e.path, e.size, e.blocks.len());
            }
            println!(
                "{} entry(s). Solid={} Encrypted={}",
                toc.entries.len(),
                header.is_solid(),
                header.is_encrypted()
            );
        }

        Commands::Test { archive, password, log } => {
            let _logger = log.logger();
            let password = if password { Some(read_password()?) } else { None };
            let report = vfa::verify::test(&archive, &password)?;
            println!(
                "OK: {} file(s), {} block(s) verified. Digest={}",
                report.files,
                report.blocks,
                if report.digest_ok { "valid" } else { "INVALID" }
            );
        }

        Commands::Extract { archive, out_dir, password, capture, log } => {
            let logger = log.logger();
            let password = if password { Some(read_password()?) } else { None };
            let out_dir = vfa::reader::resolve_out_dir(&out_dir);
            let opts = vfa::reader::ExtractOptions { password, capture: capture.options() };
            let report = vfa::reader::extract(&archive, &out_dir, &opts, &logger)?;
            println!("Extracted {} entry(s) to {}", report.entries, out_dir.display());
        }
    }
    Ok(())
}

/// Maps each error class from spec §7 to a distinct non-zero exit code.
fn exit_code_for(err: &VfaError) -> u8 {
    match err {
        VfaError::Header(_) | VfaError::Footer(_) | VfaError::Toc(_) => 1,
        VfaError::Crypto(e) => match e {
            vfa::crypto::CryptoError::DecryptionFailed => 2,
            _ => 4,
        },
        VfaError::Policy(PolicyError::WrongPassword) => 2,
        VfaError::Integrity(_) => 3,
        VfaError::Codec(_) => 4,
        VfaError::Policy(_) => 5,
        VfaError::Io(_) => 6,
        VfaError::Json(_) => 1,
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vfa: error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
