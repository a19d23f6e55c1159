use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};

use super::{
    AppState, GoalPayload, LumpsumPayload, SipPayload, SplitPayload, goal_response_from_payload,
    lumpsum_response_from_payload, run_http_server, sip_response_from_payload,
    split_response_from_payload,
};
use crate::core::{AggregatorConfig, DEFAULT_BALANCE_EPSILON, GoalSolveConfig, RiskThresholds};

#[derive(Parser, Debug)]
#[command(
    name = "basketcalc",
    about = "SIP, lumpsum and goal projections plus basket allocation maths"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve(ServeArgs),
    /// Project a periodic investment plan
    Sip(SipArgs),
    /// Project a one-time investment
    Lumpsum(LumpsumArgs),
    /// Solve the periodic contribution needed for a goal
    Goal(GoalArgs),
    /// Split 100% evenly across a number of funds
    Split {
        #[arg(help = "Number of funds in the basket")]
        funds: usize,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct EngineArgs {
    #[arg(
        long,
        default_value_t = DEFAULT_BALANCE_EPSILON,
        help = "Allowed distance of a weight total from 100 before a basket is unbalanced"
    )]
    balance_epsilon: f64,
    #[arg(long, default_value_t = 1.5, help = "Risk scores below this are Moderate")]
    risk_moderate_below: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Risk scores below this (and not Moderate) are Moderate-High"
    )]
    risk_moderate_high_below: f64,
    #[arg(long, default_value_t = 60, help = "Bisection iteration cap for the goal solver")]
    solver_max_iterations: u32,
}

#[derive(Args, Debug)]
pub struct SipArgs {
    #[arg(long, help = "Contribution per period")]
    amount: f64,
    #[arg(long, default_value_t = 12, help = "Periods per year: 1, 2, 4 or 12")]
    frequency: u32,
    #[arg(long)]
    years: f64,
    #[arg(long, help = "Expected annual return in percent, e.g. 12")]
    return_pct: f64,
    #[arg(long, conflicts_with = "step_up_pct", help = "Fixed yearly step-up")]
    step_up_amount: Option<f64>,
    #[arg(long, help = "Yearly step-up in percent")]
    step_up_pct: Option<f64>,
    #[arg(long, help = "Include a year-by-year breakdown")]
    yearly: bool,
}

#[derive(Args, Debug)]
pub struct LumpsumArgs {
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    years: f64,
    #[arg(long, help = "Expected annual return in percent, e.g. 12")]
    return_pct: f64,
}

#[derive(Args, Debug)]
pub struct GoalArgs {
    #[arg(long)]
    target_year: i32,
    #[arg(long, help = "Defaults to the current calendar year")]
    current_year: Option<i32>,
    #[arg(long, help = "Cost of the goal in today's money")]
    current_cost: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual inflation in percent")]
    inflation_pct: f64,
    #[arg(long, help = "Expected annual return in percent, e.g. 12")]
    return_pct: f64,
    #[arg(long, default_value_t = 0.0, help = "Yearly contribution step-up in percent")]
    step_up_pct: f64,
    #[arg(long, default_value_t = 0.0, help = "Amount already invested today")]
    lumpsum: f64,
}

impl From<SipArgs> for SipPayload {
    fn from(args: SipArgs) -> Self {
        Self {
            amount: Some(args.amount),
            frequency: Some(args.frequency),
            years: Some(args.years),
            return_pct: Some(args.return_pct),
            step_up_amount: args.step_up_amount,
            step_up_pct: args.step_up_pct,
            include_yearly: Some(args.yearly),
        }
    }
}

impl From<LumpsumArgs> for LumpsumPayload {
    fn from(args: LumpsumArgs) -> Self {
        Self {
            amount: Some(args.amount),
            years: Some(args.years),
            return_pct: Some(args.return_pct),
        }
    }
}

impl From<GoalArgs> for GoalPayload {
    fn from(args: GoalArgs) -> Self {
        Self {
            target_year: Some(args.target_year),
            current_year: args.current_year,
            current_cost: Some(args.current_cost),
            inflation_pct: Some(args.inflation_pct),
            return_pct: Some(args.return_pct),
            step_up_pct: Some(args.step_up_pct),
            lumpsum: Some(args.lumpsum),
        }
    }
}

fn build_state(engine: EngineArgs) -> Result<AppState, String> {
    if !engine.balance_epsilon.is_finite() || engine.balance_epsilon < 0.0 {
        return Err("--balance-epsilon must be >= 0".to_string());
    }
    if engine.risk_moderate_high_below < engine.risk_moderate_below {
        return Err(
            "--risk-moderate-high-below must be >= --risk-moderate-below".to_string(),
        );
    }
    if engine.solver_max_iterations == 0 {
        return Err("--solver-max-iterations must be > 0".to_string());
    }

    Ok(AppState {
        solver: GoalSolveConfig {
            max_iterations: engine.solver_max_iterations,
            ..GoalSolveConfig::default()
        },
        aggregator: AggregatorConfig {
            balance_epsilon: engine.balance_epsilon,
            risk: RiskThresholds {
                moderate_below: engine.risk_moderate_below,
                moderate_high_below: engine.risk_moderate_high_below,
            },
        },
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| format!("JSON error: {e}"))?;
    println!("{out}");
    Ok(())
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve(args) => {
            let state = build_state(args.engine)?;
            let addr = SocketAddr::new(args.host, args.port);
            run_http_server(addr, state)
                .await
                .map_err(|e| format!("Server error: {e}"))
        }
        Command::Sip(args) => print_json(&sip_response_from_payload(args.into())?),
        Command::Lumpsum(args) => print_json(&lumpsum_response_from_payload(args.into())?),
        Command::Goal(args) => print_json(&goal_response_from_payload(
            args.into(),
            &GoalSolveConfig::default(),
        )?),
        Command::Split { funds } => {
            print_json(&split_response_from_payload(SplitPayload { funds })?)
        }
    }
}
