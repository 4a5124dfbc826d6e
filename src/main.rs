use tess_demo::{DemoConfig, run};

fn main() -> anyhow::Result<()> {
    run(DemoConfig::default())
}
