use anyhow::{bail, Context, Result};
use chex::tree::{shapes, NodeCosts};
use chex::{Algorithm, Decision, ExecutionTree, Planner, PlannerConfig, Storage, Traversal};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chex", about = "Checkpoint planning for branching replays")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print statistics of a synthetic tree.
    Info {
        #[command(flatten)]
        tree: TreeArgs,
    },
    /// Run algorithms at one budget and print their costs.
    Compare {
        #[command(flatten)]
        tree: TreeArgs,
        /// Cache budget in storage units.
        #[arg(long, default_value_t = 8)]
        budget: Storage,
        /// Comma-separated algorithm names (default: all).
        #[arg(long, value_delimiter = ',')]
        algorithms: Vec<String>,
        #[command(flatten)]
        planner: PlannerArgs,
    },
    /// Run algorithms over a range of budgets.
    Sweep {
        #[command(flatten)]
        tree: TreeArgs,
        /// Smallest budget.
        #[arg(long, default_value_t = 0)]
        from: Storage,
        /// Largest budget.
        #[arg(long, default_value_t = 16)]
        to: Storage,
        /// Budget increment.
        #[arg(long, default_value_t = 2)]
        step: Storage,
        /// Comma-separated algorithm names (default: all).
        #[arg(long, value_delimiter = ',')]
        algorithms: Vec<String>,
        #[command(flatten)]
        planner: PlannerArgs,
    },
    /// Print the recursive planner's replay plan.
    Script {
        #[command(flatten)]
        tree: TreeArgs,
        /// Cache budget in storage units.
        #[arg(long, default_value_t = 8)]
        budget: Storage,
        #[command(flatten)]
        planner: PlannerArgs,
    },
}

#[derive(Args, Debug)]
struct TreeArgs {
    /// Tree shape.
    #[arg(long, value_enum, default_value_t = Shape::Fixed)]
    shape: Shape,
    /// Children per node for k-ary trees.
    #[arg(long, default_value_t = 2)]
    arity: usize,
    /// Height of k-ary trees.
    #[arg(long, default_value_t = 4)]
    height: usize,
    /// Node cost model.
    #[arg(long, value_enum, default_value_t = CostModel::Depth)]
    costs: CostModel,
}

#[derive(Args, Debug)]
struct PlannerArgs {
    /// Recursive planner traversal.
    #[arg(long, value_enum, default_value_t = TraversalArg::Auto)]
    traversal: TraversalArg,
    /// Disable memo lookups in the recursive traversal.
    #[arg(long)]
    no_memo: bool,
    /// Re-derive every script entry after planning.
    #[arg(long)]
    verify: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Shape {
    Fixed,
    Kary,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CostModel {
    Unit,
    Depth,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TraversalArg {
    Recursive,
    Iterative,
    Auto,
}

impl TreeArgs {
    fn build(&self) -> Result<ExecutionTree> {
        let costs: fn(usize) -> NodeCosts = match self.costs {
            CostModel::Unit => shapes::unit_costs,
            CostModel::Depth => shapes::depth_scaled,
        };
        Ok(match self.shape {
            Shape::Fixed => shapes::fixed(costs),
            Shape::Kary => {
                if self.arity == 0 {
                    bail!("k-ary trees need arity >= 1");
                }
                shapes::kary(self.arity, self.height, costs)
            }
        })
    }
}

impl PlannerArgs {
    fn config(&self) -> PlannerConfig {
        let traversal = match self.traversal {
            TraversalArg::Recursive => Traversal::Recursive,
            TraversalArg::Iterative => Traversal::Iterative,
            TraversalArg::Auto => Traversal::Auto,
        };
        PlannerConfig::default()
            .with_traversal(traversal)
            .with_memoize(!self.no_memo)
            .with_verify_scripts(self.verify)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { tree } => run_info(&tree)?,
        Commands::Compare {
            tree,
            budget,
            algorithms,
            planner,
        } => run_compare(&tree, budget, &algorithms, &planner)?,
        Commands::Sweep {
            tree,
            from,
            to,
            step,
            algorithms,
            planner,
        } => run_sweep(&tree, from, to, step, &algorithms, &planner)?,
        Commands::Script {
            tree,
            budget,
            planner,
        } => run_script(&tree, budget, &planner)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "chex=debug" } else { "chex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>> {
    if names.is_empty() {
        return Ok(Algorithm::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            name.parse::<Algorithm>()
                .with_context(|| format!("valid names: {}", algorithm_names()))
        })
        .collect()
}

fn algorithm_names() -> String {
    Algorithm::ALL
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_info(args: &TreeArgs) -> Result<()> {
    let tree = args.build()?;
    println!("{}", tree.stats().report());
    println!("time horizon: {}", chex::baseline::time_horizon(&tree));
    for algorithm in Algorithm::ALL {
        println!("{:<16}{}", algorithm.name(), algorithm.description());
    }
    Ok(())
}

fn run_compare(
    args: &TreeArgs,
    budget: Storage,
    names: &[String],
    planner_args: &PlannerArgs,
) -> Result<()> {
    let algorithms = parse_algorithms(names)?;
    let mut tree = args.build()?;
    tree.set_cache_budget(budget);

    let mut planner = Planner::new(&tree, planner_args.config());
    let costs = planner
        .compare(&tree, &algorithms)
        .with_context(|| format!("planning failed at budget {budget}"))?;

    println!("budget {budget}");
    for (algorithm, cost) in costs {
        println!("{:<16}{cost}", algorithm.name());
    }
    Ok(())
}

fn run_sweep(
    args: &TreeArgs,
    from: Storage,
    to: Storage,
    step: Storage,
    names: &[String],
    planner_args: &PlannerArgs,
) -> Result<()> {
    if step == 0 {
        bail!("--step must be positive");
    }
    if from > to {
        bail!("empty budget range {from}..={to}");
    }
    let algorithms = parse_algorithms(names)?;
    let mut tree = args.build()?;
    let mut planner = Planner::new(&tree, planner_args.config());

    let header: Vec<&str> = algorithms.iter().map(|a| a.name()).collect();
    println!("budget\t{}", header.join("\t"));

    let mut budget = from;
    while budget <= to {
        tree.set_cache_budget(budget);
        let costs = planner
            .compare(&tree, &algorithms)
            .with_context(|| format!("planning failed at budget {budget}"))?;
        let row: Vec<String> = costs.iter().map(|(_, cost)| cost.to_string()).collect();
        println!("{budget}\t{}", row.join("\t"));

        match budget.checked_add(step) {
            Some(next) => budget = next,
            None => break,
        }
    }
    Ok(())
}

fn run_script(args: &TreeArgs, budget: Storage, planner_args: &PlannerArgs) -> Result<()> {
    let mut tree = args.build()?;
    tree.set_cache_budget(budget);

    let mut planner = Planner::new(&tree, planner_args.config());
    let outcome = planner
        .run(&tree, Algorithm::Recursive)
        .context("recursive planning failed")?;
    let Decision::Script(plan) = outcome.decision else {
        bail!("recursive planner returned no script");
    };

    let labels = |id: chex::NodeId| tree.node(id).label().to_string();
    let script: Vec<String> = plan
        .script
        .iter()
        .map(|step| {
            let marker = if step.shared { "+" } else { "-" };
            format!("{marker}{}", labels(step.node))
        })
        .collect();

    println!("cost {}", plan.cost);
    println!("root script: {}", script.join(" "));
    print!("{}", plan.replay);

    let stats = plan.stats();
    println!(
        "executions={} checkpoints={} restores={} restarts={} entries={} footprint={}B",
        stats.executions,
        stats.checkpoints,
        stats.restores,
        stats.restarts,
        stats.entries,
        stats.footprint_bytes
    );
    println!("fingerprint {}", plan.replay.fingerprint());
    Ok(())
}
