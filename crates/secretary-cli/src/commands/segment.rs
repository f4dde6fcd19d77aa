use clap::Args;
use secretary_core::pomodoro::{segment, Segment};
use secretary_core::Config;

#[derive(Args)]
pub struct SegmentArgs {
    /// Work duration in minutes
    minutes: u32,
    /// Emit a single segment instead of pomodoros
    #[arg(long)]
    no_pomodoro: bool,
}

pub fn run(args: SegmentArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.minutes == 0 {
        return Err("duration must be positive".into());
    }
    let settings = Config::load_or_default().pomodoro;
    let segments = if args.no_pomodoro {
        vec![Segment::work(args.minutes)]
    } else {
        segment(args.minutes, &settings)
    };
    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}
