//! Till CLI

use std::{fs, io, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use till::{
    api::HttpStorefrontApi,
    cart::Cart,
    checkout::CheckoutContext,
    config::StoreConfig,
    coupons::CouponSlot,
    payments::{PaymentMethod, PaymentMethodConfig},
    quote::Quote,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "till", about = "Storefront cart pricing and checkout tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Price a cart for a delivery country and list its payment methods
    Quote(QuoteArgs),
}

#[derive(Debug, Args)]
struct QuoteArgs {
    /// Store configuration (YAML); built-in defaults when omitted
    #[arg(long, env = "TILL_CONFIG")]
    config: Option<PathBuf>,

    /// Cart items (JSON array)
    #[arg(long)]
    cart: PathBuf,

    /// Delivery country (ISO alpha-2)
    #[arg(long)]
    country: String,

    /// Currently selected payment method
    #[arg(long)]
    method: Option<PaymentMethod>,

    /// Methods the merchant has enabled, when not fetched with --live
    #[arg(long, value_delimiter = ',')]
    enable: Vec<PaymentMethod>,

    /// Fetch rates and payment settings from the storefront backend
    #[arg(long)]
    live: bool,

    /// Storefront backend origin, overriding the config file
    #[arg(long, env = "TILL_API_URL")]
    api_url: Option<String>,

    /// Coupon to validate against the backend (requires --live)
    #[arg(long, requires = "live")]
    coupon: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info"));

    let initialized = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();

    if initialized.is_err() {
        warn!("tracing subscriber already installed");
    }
}

#[tokio::main]
#[expect(clippy::print_stderr, reason = "CLI reports fatal errors to the user")]
async fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Quote(args) => quote(args).await,
    }
}

#[expect(clippy::print_stdout, reason = "CLI output to user")]
async fn quote(args: QuoteArgs) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_path(path)
            .map_err(|error| format!("failed to load {}: {error}", path.display()))?,
        None => StoreConfig::default(),
    };

    if let Some(api_url) = args.api_url {
        config.api.base_url = api_url;
    }

    let cart_json = fs::read_to_string(&args.cart)
        .map_err(|error| format!("failed to read {}: {error}", args.cart.display()))?;
    let cart = Cart::from_json(&cart_json);

    let currency = config
        .currency_for(&args.country)
        .ok_or_else(|| format!("we do not deliver to {}", args.country))?;

    let mut coupon = CouponSlot::new();

    let context = if args.live {
        let api = HttpStorefrontApi::new(&config.api)
            .map_err(|error| format!("failed to create api client: {error}"))?;
        let context = CheckoutContext::load(&api, &config).await;

        if let Some(code) = &args.coupon {
            let subtotal = cart.subtotal(&currency, &context.rates);

            match coupon.apply(&api, code, subtotal, &currency).await {
                Ok(applied) => info!(message = %applied.message, "coupon applied"),
                Err(error) => warn!(%error, "coupon not applied"),
            }
        }

        context
    } else {
        let mut context = CheckoutContext::offline(&config);

        if !args.enable.is_empty() {
            context.methods = PaymentMethodConfig::from_enabled(args.enable.iter().copied());
        }

        context
    };

    let quote = Quote::build(&cart, &currency, &context.rates, coupon.applied());

    quote
        .write_to(io::stdout().lock())
        .map_err(|error| format!("failed to print quote: {error}"))?;

    let (methods, selected) = context.available_methods(&args.country, args.method, &config);

    let methods = methods
        .iter()
        .copied()
        .map(PaymentMethod::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    println!(" Payment methods: {methods}");
    println!(
        " Selected: {}",
        selected.map_or("none", PaymentMethod::as_str)
    );

    Ok(())
}
