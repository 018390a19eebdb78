use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use churnwise_classifiers::serving::ServingModels;
use churnwise_cli::config::{validate_tsv_or_csv_file, AppConfig};
use churnwise_cli::server;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CHURNWISE_LOG", "error,churnwise=info"))
        .init();

    let matches = Command::new("churnwise")
        .version(clap::crate_version!())
        .about("Churnwise - telecom customer churn prediction")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            with_common_args(
                Command::new("serve").about("Start the web application and prediction API"),
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .help("Address to bind. Overrides the host in the configuration file.")
                    .value_parser(clap::builder::NonEmptyStringValueParser::new())
                    .value_hint(ValueHint::Hostname),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .help("Port to listen on. Overrides the port in the configuration file.")
                    .value_parser(clap::value_parser!(u16)),
            ),
        )
        .subcommand(with_common_args(
            Command::new("train")
                .about("Train both models, write the artifacts and print the metrics"),
        ))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", sub_m)) => handle_serve(sub_m),
        Some(("train", sub_m)) => handle_train(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn with_common_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("config")
                .help("Path to application JSON configuration file")
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .help("Path to the customer dataset (*.csv or *.tsv). Overrides the configuration file.")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("model_dir")
                .short('m')
                .long("model-dir")
                .help("Directory holding the model artifacts. Overrides the configuration file.")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::DirPath),
        )
}

fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let config = AppConfig::from_arguments(matches)?;
    log::info!(
        "[Churnwise::Serve] dataset {:?}, model directory {:?}",
        config.data_path,
        config.model_dir
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(server::serve(config)) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Server failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = AppConfig::from_arguments(matches)?;
    validate_tsv_or_csv_file(&config.data_path)?;
    log::info!("[Churnwise::Train] Training from {:?}", config.data_path);

    let paths = config.artifact_paths();
    match ServingModels::train_and_persist(&config.data_path, &config.pipeline, &paths) {
        Ok(serving) => {
            println!("{}", serde_json::to_string_pretty(serving.metrics())?);
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {}", e);
            std::process::exit(1)
        }
    }
}
