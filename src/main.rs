use tmx_batch::{run, Config};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    #[cfg(feature = "profile")]
    let _guard = {
        use tracing_subscriber::prelude::*;
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new().build();
        tracing_subscriber::registry().with(chrome_layer).init();
        guard
    };

    let config = Config::load_or_default("config.yaml")?;
    run(config)
}
