use std::process::exit;

use indicatif::{ProgressBar, ProgressStyle};
use multipole::{FrameStyle, MultipoleSite};
use pme::{EvaluationConfig, Pme};

/// Sweeps an alchemically softened ion pair over the lambda window.
fn main() {
    let mut cation = [0.0; 10];
    cation[0] = 1.0;
    let mut anion = [0.0; 10];
    anion[0] = -1.0;

    let mut soft_ion =
        MultipoleSite::new(0, cation, FrameStyle::None, &[]).polarize(0.12, 0.39);
    soft_ion.soft = true;
    let counter_ion =
        MultipoleSite::new(1, anion, FrameStyle::None, &[]).polarize(0.35, 0.39);

    let coords = vec![[0.0, 0.0, 0.0], [3.2, 0.0, 0.0]];
    let keywords = config::get_keywords();
    let mut engine = match Pme::aperiodic(vec![soft_ion, counter_ion], &coords, &keywords) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{}", err);
            exit(2);
        }
    };

    let steps = 101;
    let style = ProgressStyle::with_template(config::PBAR_STYLE)
        .unwrap_or(ProgressStyle::default_bar());
    let pbar = ProgressBar::new(steps).with_style(style);

    let mut curve = Vec::with_capacity(steps as usize);
    for i in 0..steps {
        let lambda = i as f64 / (steps - 1) as f64;
        let config = EvaluationConfig {
            lambda: Some(lambda),
            ..EvaluationConfig::default()
        };
        match engine.energy(&coords, &config) {
            Ok(report) => curve.push((lambda, report.total, report.dudl)),
            Err(err) => {
                eprintln!("{}", err);
                exit(2);
            }
        }
        pbar.inc(1);
    }
    pbar.finish_with_message("Done");

    for (lambda, u, dudl) in curve {
        println!("{lambda:.2}  U = {u:12.6}  dU/dλ = {dudl:12.6}");
    }
}
