use std::process;

use log::{error, info};

use amqp_context::amqp::handler::Service;
use amqp_context::config::{init, init_logger, Env};
use amqp_context::context::AmqpContext;


const PRINT_METHOD: &str = "print";

#[tokio::main]
async fn main() {
    // 1. Init logger
    if let Err(err) = init_logger() {
        eprintln!("cannot initialize logger, err = {:?}", err);
        process::exit(1);
    }
    info!(target: "app", "Starting application...");

    // 2. Load the .env file and the AMQP_* variables
    let env: Env = init().unwrap_or_else(|err| {
        error!(target: "app", "Cannot read environment variables. Err = {:?}", err);
        process::exit(1);
    });

    // 3. Validate connection parameters
    let params = env.connection_params().unwrap_or_else(|err| {
        error!(target: "app", "Invalid connection parameters. Err = {}", err);
        process::exit(1);
    });
    let ctx = AmqpContext::new(params);

    // 4. Run the requested action
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("listen") => listen(&ctx, &env).await,
        Some("publish") => publish(&ctx, &env, &args[1..].join(" ")).await,
        Some(other) => {
            error!(target: "app", "Unknown command '{}', expected 'listen' or 'publish <body>'",
                other);
            process::exit(2);
        }
    };
    if let Err(err) = result {
        error!(target: "app", "Command failed. Err = {:?}", err);
        process::exit(1);
    }
}

async fn listen(ctx: &AmqpContext, env: &Env) -> anyhow::Result<()> {
    let service = Service::new().route(PRINT_METHOD, |body: &str| -> anyhow::Result<()> {
        println!("{}", body);
        Ok(())
    });
    let outcome = ctx
        .listen(&service, PRINT_METHOD, &env.amqp_queue_name, Some(env.amqp_max_iterations))
        .await?;
    info!(target: "app", "listen - {} messages handled in {} iterations",
        outcome.delivered, outcome.iterations);
    Ok(())
}

async fn publish(ctx: &AmqpContext, env: &Env, body: &str) -> anyhow::Result<()> {
    ctx.publish(body, &env.amqp_exchange, &env.amqp_routing_key).await?;
    info!(target: "app", "publish - message published to exchange {}", &env.amqp_exchange);
    Ok(())
}
