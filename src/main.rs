use clap::Parser;
use mango_quest::config::{Ctx, Env, setup_tracing};
use mango_quest::launch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Env::parse();
    let ctx = Ctx::load(&env)?;
    setup_tracing(&ctx.log_level);

    launch(ctx).await
}
