use std::io;

use chat_agent::{logging, repl, ChatAgent, ChatConfig};

fn main() -> io::Result<()> {
    let config = ChatConfig::from_env();
    logging::init_tracing(&config.log_filter);

    let mut agent = ChatAgent::from_config(&config).map_err(io::Error::other)?;
    agent.initialize().map_err(io::Error::other)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = repl::run(&mut agent, stdin.lock(), &mut stdout.lock());

    agent.shutdown();
    result
}
