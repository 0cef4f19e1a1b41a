//! `nfse` command line: emit NFS-e through the national API.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use nfse::api::*;
use nfse::core::*;
use nfse::dps::{build_dps, import_nfse};
use nfse::sign::{CertificateSource, DpsSigner, PemFile, Pkcs12File, SigningMaterial};

/// Directories created by `nfse init`.
const WORKSPACE_DIRS: &[&str] = &[
    "cert",
    "logs",
    "prestadores",
    "tomadores",
    "servicos",
    "danfse",
    "nfse",
    "dps",
];

#[derive(Parser)]
#[command(name = "nfse", version)]
#[command(about = "Emit Brazilian NFS-e through the national API")]
struct Cli {
    /// Debug output, including API responses.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    silent: bool,

    /// Working directory holding config.json and the artifact folders.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory layout and a default config.json.
    Init,
    /// Assemble, sign and send a DPS.
    Emitir(EmitArgs),
    /// Fetch an issued NFS-e and save its parties and service as templates.
    Importar {
        /// 50-digit access key.
        chave_acesso: String,
    },
    /// Download the DANFSe PDF of an issued NFS-e.
    Danfse {
        /// 50-digit access key.
        chave_acesso: String,
    },
}

#[derive(Args)]
struct EmitArgs {
    /// Service value, e.g. 1500.00 or 1500,00.
    #[arg(long)]
    valor: String,

    /// Emission date, YYYY-MM-DD or DD/MM/YYYY.
    #[arg(long)]
    data: String,

    #[arg(long)]
    prestador: Option<PathBuf>,

    #[arg(long)]
    tomador: Option<PathBuf>,

    #[arg(long)]
    servico: Option<PathBuf>,

    /// producao or producaorestrita.
    #[arg(long)]
    ambiente: Option<Environment>,

    /// Signature digest, sha256 or sha1; overrides config.json.
    #[arg(long)]
    digest: Option<DigestAlgorithm>,

    #[arg(long, conflicts_with = "no_dry_run")]
    dry_run: bool,

    #[arg(long)]
    no_dry_run: bool,
}

struct Context {
    dir: PathBuf,
    verbosity: Verbosity,
}

impl Context {
    fn config_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_CONFIG_FILE)
    }

    fn path(&self, relative: &Path) -> PathBuf {
        self.dir.join(relative)
    }

    /// Print a result line unless silent.
    fn report(&self, line: impl AsRef<str>) {
        if self.verbosity != Verbosity::Silent {
            println!("{}", line.as_ref());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.silent);
    init_tracing(verbosity);

    let ctx = Context {
        dir: cli.dir,
        verbosity,
    };
    let result = match cli.command {
        Commands::Init => init(&ctx),
        Commands::Emitir(args) => emit(&ctx, args),
        Commands::Importar { chave_acesso } => import(&ctx, &chave_acesso),
        Commands::Danfse { chave_acesso } => danfse(&ctx, &chave_acesso),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match &err {
                NfseError::Validation(errors) => {
                    for e in errors {
                        tracing::error!("{e}");
                    }
                }
                other => tracing::error!("{other}"),
            }
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn init(ctx: &Context) -> Result<(), NfseError> {
    for dir in WORKSPACE_DIRS {
        let path = ctx.dir.join(dir);
        if path.is_dir() {
            tracing::debug!(path = %path.display(), "directory exists");
        } else {
            fs::create_dir_all(&path)?;
            ctx.report(format!("created {}/", path.display()));
        }
    }

    let config_path = ctx.config_path();
    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "config already exists, left unchanged");
    } else {
        Config::default().save(&config_path)?;
        ctx.report(format!("created {}", config_path.display()));
    }
    Ok(())
}

fn load_certificate(ctx: &Context, config: &Config) -> Result<SigningMaterial, NfseError> {
    let material = match &config.certificate_pem {
        Some(pem) => PemFile::new(ctx.path(pem)).load()?,
        None => {
            let pfx = ctx.path(&config.certificate_pfx);
            if !pfx.exists() {
                return Err(NfseError::Certificate(format!(
                    "certificate file not found: {}",
                    pfx.display()
                )));
            }
            Pkcs12File::new(pfx, ctx.path(&config.certificate_password_file)).load()?
        }
    };

    let info = material.info()?;
    info.ensure_usable(Utc::now())?;
    tracing::info!(
        holder = %info.holder,
        issuer = %info.issuer,
        days_to_expiry = info.days_to_expiry(Utc::now()),
        "certificate loaded"
    );
    Ok(material)
}

fn template_path(
    ctx: &Context,
    given: Option<PathBuf>,
    default: Option<&PathBuf>,
    flag: &str,
    config_key: &str,
) -> Result<PathBuf, NfseError> {
    given
        .or_else(|| default.cloned())
        .map(|p| ctx.path(&p))
        .ok_or_else(|| {
            NfseError::Template(format!(
                "no {flag} template: pass --{flag} or set defaults.{config_key} in config.json"
            ))
        })
}


fn transport(
    ctx: &Context,
    config: &Config,
    material: &SigningMaterial,
) -> Result<Box<dyn NfseTransport>, NfseError> {
    if config.dry_run {
        Ok(Box::new(DryRunTransport::new(config.environment)))
    } else {
        Ok(Box::new(HttpTransport::new(config, material, ctx.verbosity)?))
    }
}

fn emit(ctx: &Context, args: EmitArgs) -> Result<(), NfseError> {
    let config_path = ctx.config_path();
    let mut config = Config::load(&config_path)?;
    if let Some(environment) = args.ambiente {
        config.environment = environment;
    }
    if let Some(digest) = args.digest {
        config.digest = digest;
    }
    if args.dry_run {
        config.dry_run = true;
    } else if args.no_dry_run {
        config.dry_run = false;
    }

    let issued_at = parse_emission_date(&args.data)?;
    let value = parse_service_value(&args.valor)?;
    let material = load_certificate(ctx, &config)?;

    let defaults = &config.defaults;
    let provider = Provider::load(template_path(
        ctx,
        args.prestador,
        defaults.prestador.as_ref(),
        "prestador",
        "prestador",
    )?)?;
    let customer = Customer::load(template_path(
        ctx,
        args.tomador,
        defaults.tomador.as_ref(),
        "tomador",
        "tomador",
    )?)?;
    let service = Service::load(template_path(
        ctx,
        args.servico,
        defaults.servicos.as_ref(),
        "servico",
        "servicos",
    )?)?;

    let request = EmissionRequestBuilder::new(value, issued_at)
        .provider(provider)
        .customer(customer)
        .service(service)
        .build()?;

    let settings = config.dps_settings();
    let id = generate_dps_id(&request.provider, settings.series, settings.number)?;
    let mut dps = build_dps(&request, &id, &settings)?;
    DpsSigner::new(&material)
        .digest(config.digest)
        .sign(&mut dps)?;
    tracing::info!(id = %id, environment = %config.environment, digest = %config.digest, "DPS signed");

    let timestamp = artifact_timestamp();
    let submission = Submission {
        dir: &ctx.dir,
        timestamp: &timestamp,
        request: &request,
        id: &id,
    };
    let transport = transport(ctx, &config, &material)?;
    let receipt = submission.submit(&dps.to_xml(), transport.as_ref(), &mut config, &config_path)?;

    if receipt.dry_run {
        ctx.report(format!("dry run: DPS {id} signed, nothing was sent"));
    } else {
        ctx.report(format!(
            "NFS-e issued, access key {}",
            receipt.access_key.as_deref().unwrap_or("-")
        ));
    }
    Ok(())
}

fn import(ctx: &Context, access_key: &str) -> Result<(), NfseError> {
    let config = Config::load(ctx.config_path())?;
    let material = load_certificate(ctx, &config)?;
    let transport = HttpTransport::new(&config, &material, ctx.verbosity)?;

    let receipt = transport.query(access_key)?;
    let xml = receipt.nfse_xml()?.ok_or_else(|| NfseError::Api {
        status: Some(receipt.status),
        message: "response carries no NFS-e XML".into(),
    })?;
    let templates = import_nfse(&xml)?;

    for path in templates.save_all(&ctx.dir, &artifact_timestamp())? {
        ctx.report(format!("saved {}", path.display()));
    }
    Ok(())
}

fn danfse(ctx: &Context, access_key: &str) -> Result<(), NfseError> {
    let config = Config::load(ctx.config_path())?;
    let material = load_certificate(ctx, &config)?;
    let transport = HttpTransport::new(&config, &material, ctx.verbosity)?;

    // Party documents only name the file; a failed lookup is not fatal.
    let parties = transport
        .query(access_key)
        .and_then(|receipt| {
            let xml = receipt.nfse_xml()?.ok_or_else(|| NfseError::Xml("no NFS-e XML".into()))?;
            import_nfse(&xml)
        })
        .inspect_err(|e| tracing::warn!("cannot read NFS-e parties: {e}"))
        .ok();

    let pdf = transport.download_danfse(access_key)?;

    let timestamp = artifact_timestamp();
    let file_name = match &parties {
        Some(t) => format!(
            "{timestamp}_{}_{}_{access_key}.pdf",
            t.provider.document(),
            t.customer.document()
        ),
        None => format!("{timestamp}_{access_key}.pdf"),
    };
    let path = ctx.dir.join("danfse").join(file_name);
    write_artifact(&path, pdf)?;
    ctx.report(format!("saved {}", path.display()));
    Ok(())
}
