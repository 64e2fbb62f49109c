use std::io::{self, IsTerminal};
use std::net::{IpAddr, SocketAddr, TcpListener};

use actix_web::{App, middleware, web};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, crate_version};
use colored::*;
use log::{LevelFilter, error, info, warn};

mod args;
mod auth;
mod config;
mod consts;
mod dav_xml;
mod dispatch;
mod errors;
mod file_op;
mod file_utils;
mod guard;
mod handlers;
mod listing;
mod locks;
mod path_utils;
mod props;
mod renderer;

use crate::config::DavConfig;
use crate::dispatch::{DavState, dispatch};
use crate::errors::StartupError;

fn main() -> Result<()> {
    let args = args::CliArgs::parse();

    if let Some(shell) = args.print_completions {
        let mut clap_app = args::CliArgs::command();
        let app_name = clap_app.get_name().to_string();
        clap_complete::generate(shell, &mut clap_app, app_name, &mut io::stdout());
        return Ok(());
    }

    if args.print_manpage {
        let clap_app = args::CliArgs::command();
        let man = clap_mangen::Man::new(clap_app);
        man.render(&mut io::stdout())?;
        return Ok(());
    }

    let dav_config = DavConfig::try_from_args(args)?;
    init_logging(&dav_config)?;

    run(dav_config).inspect_err(|e| {
        errors::log_error_chain(e.to_string());
    })?;

    Ok(())
}

/// Log to the terminal with the target (the event category) on every line.
///
/// The logger itself accepts everything, the effective level is the global max level so
/// a configuration reload can change it.
fn init_logging(dav_config: &DavConfig) -> Result<()> {
    let log_config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc2822()
        .set_target_level(LevelFilter::Error)
        .build();

    simplelog::TermLogger::init(
        LevelFilter::Trace,
        log_config.clone(),
        simplelog::TerminalMode::Mixed,
        if io::stdout().is_terminal() {
            simplelog::ColorChoice::Auto
        } else {
            simplelog::ColorChoice::Never
        },
    )
    .or_else(|_| simplelog::SimpleLogger::init(LevelFilter::Trace, log_config))
    .context("Couldn't initialize logger")?;

    log::set_max_level(dav_config.log_level());
    Ok(())
}

#[actix_web::main]
async fn run(dav_config: DavConfig) -> Result<(), StartupError> {
    let path_string = dav_config.path.to_string_lossy().to_string();

    println!(
        "{name} v{version}",
        name = "davserve".bold(),
        version = crate_version!()
    );

    if dav_config.allow_anonymous {
        warn!(target: "security", "Anonymous access is enabled, credentials are not checked");
    }
    if dav_config.whitelist.enabled {
        info!(
            target: "security",
            "IP whitelist enabled with {} entries",
            dav_config.whitelist.entries.len()
        );
    }

    let display_urls = {
        let (mut ifaces, wildcard): (Vec<_>, Vec<_>) = dav_config
            .interfaces
            .clone()
            .into_iter()
            .partition(|addr| !addr.is_unspecified());

        // Replace wildcard addresses with local interface addresses
        if !wildcard.is_empty() {
            let all_ipv4 = wildcard.iter().any(|addr| addr.is_ipv4());
            let all_ipv6 = wildcard.iter().any(|addr| addr.is_ipv6());
            ifaces = if_addrs::get_if_addrs()
                .unwrap_or_else(|e| {
                    error!(target: "server", "Failed to get local interface addresses: {e}");
                    Default::default()
                })
                .into_iter()
                .map(|iface| iface.ip())
                .filter(|ip| (all_ipv4 && ip.is_ipv4()) || (all_ipv6 && ip.is_ipv6()))
                .collect();
            ifaces.sort();
        }

        ifaces
            .into_iter()
            .map(|addr| match addr {
                IpAddr::V4(_) => format!("http://{}:{}", addr, dav_config.port),
                IpAddr::V6(_) => format!("http://[{}]:{}", addr, dav_config.port),
            })
            .collect::<Vec<_>>()
    };

    let socket_addresses = dav_config
        .interfaces
        .iter()
        .map(|&interface| SocketAddr::new(interface, dav_config.port))
        .collect::<Vec<_>>();

    let display_sockets = socket_addresses
        .iter()
        .map(|sock| sock.to_string().green().bold().to_string())
        .collect::<Vec<_>>();

    let logging_enabled = dav_config.logging_enabled;
    let state = web::Data::new(DavState::new(dav_config));

    let srv = actix_web::HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Condition::new(
                logging_enabled,
                middleware::Logger::default(),
            ))
            .default_service(web::to(dispatch))
    });

    let srv = socket_addresses.iter().try_fold(srv, |srv, addr| {
        let listener = create_tcp_listener(*addr)
            .map_err(|e| StartupError::IoError(format!("Failed to bind server to {addr}"), e))?;

        srv.listen(listener)
            .map_err(|e| StartupError::IoError(format!("Failed to bind server to {addr}"), e))
    })?;

    let srv = srv.shutdown_timeout(0).run();

    info!(target: "server", "Serving {path_string}");
    println!("Bound to {}", display_sockets.join(", "));

    println!("Serving path {}", path_string.yellow().bold());

    println!(
        "Available at (non-exhaustive list):\n    {}\n",
        display_urls
            .iter()
            .map(|url| url.green().bold().to_string())
            .collect::<Vec<_>>()
            .join("\n    "),
    );

    if io::stdout().is_terminal() {
        println!("Quit by pressing CTRL-C");
    }

    srv.await
        .map_err(|e| StartupError::IoError("".to_owned(), e))
}

/// Allows us to set low-level socket options
///
/// This mainly used to set `set_only_v6` socket option
/// to get a consistent behavior across platforms.
fn create_tcp_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024 /* Default backlog */)?;
    Ok(TcpListener::from(socket))
}
