use clap::Parser;
use halocline::block::{Block, NoExchange};
use halocline::executor::TaskExecutor;
use halocline::stencil::{Laplacian8, StencilOperator};
use std::f64::consts::PI;

#[derive(Debug, Parser)]
#[clap(version = "0.1.0", author = "Malin Hedvall <malin.hedvall@proton.me>")]
struct Opts {
    /// Grid points per dimension of the block
    #[clap(short = 'n', long, default_value = "100")]
    points_per_dim: usize,

    /// Worker threads in the task executor
    #[clap(short = 't', long, default_value = "4")]
    num_workers: usize,

    /// Timed stencil applications
    #[clap(short = 's', long, default_value = "20")]
    num_steps: usize,

    /// Untimed applications before the clock starts
    #[clap(short = 'w', long, default_value = "2")]
    warmup_steps: usize,

    /// Ghost region width (at least the stencil extent, 4)
    #[clap(short = 'g', long, default_value = "4")]
    ghost_width: usize,

    /// Also write the timing report to this file
    #[clap(short = 'o', long)]
    report: Option<std::path::PathBuf>,
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();
    let opts = Opts::parse();
    println!("{:?}", opts);

    let n = opts.points_per_dim;
    let h = 2.0 * PI / n as f64;
    let executor = TaskExecutor::new(opts.num_workers);

    let mut input: Block<3, _> = Block::composed(n, opts.ghost_width);
    let result: Block<3, NoExchange> = Block::pure(n);

    let geometry = *input.geometry();
    input.set_values(
        (0..geometry.total())
            .map(|i| {
                (0..3)
                    .map(|d| (geometry.coordinate(i, d) as f64 * h).sin())
                    .sum()
            })
            .collect(),
    );

    let mut operator = StencilOperator::new(Laplacian8::new([h; 3]), &executor);

    let step = |input: &mut Block<3, _>, operator: &mut StencilOperator<3, _>| {
        input.start_exchange();
        operator.apply(input, &result);
        input.finish_sends();
        std::mem::swap(&mut *input.values_mut(), &mut *result.values_mut());
    };

    for _ in 0..opts.warmup_steps {
        step(&mut input, &mut operator);
    }
    input.reset_communication_time();
    operator.reset_computation_time();

    let start = std::time::Instant::now();
    for _ in 0..opts.num_steps {
        step(&mut input, &mut operator);
    }
    let elapsed = start.elapsed().as_secs_f64();

    let points = (geometry.total() * opts.num_steps) as f64;
    let report = format!(
        "total ................. {:.4}s\n\
         computation ........... {:.4}s\n\
         communication ......... {:.4}s\n\
         Mpoints/s ............. {:.2}\n\
         core-ns / point ....... {:.2}\n",
        elapsed,
        operator.computation_time().as_secs_f64(),
        input.communication_time().as_secs_f64(),
        points / elapsed * 1e-6,
        elapsed / points * 1e9 * opts.num_workers as f64
    );
    println!();
    print!("{}", report);

    if let Some(path) = &opts.report {
        std::fs::write(path, &report).expect("could not write the report file");
    }
}
