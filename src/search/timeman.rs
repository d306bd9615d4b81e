//! Time budgets.

use crate::board::types::Color;

use super::Settings;

/// Optimum and maximum time for this move, in milliseconds.
#[must_use]
pub fn calc_optimum_time(settings: &Settings, us: Color) -> (i64, i64) {
    let overhead = settings.move_overhead;
    let time = settings.time[us.index()];
    let inc = settings.inc[us.index()];

    let mtg = if settings.movestogo > 0 {
        settings.movestogo.min(50) as i64
    } else {
        50
    };

    let time_left = (time + inc * (mtg - 1) - overhead * (2 + mtg)).max(1);

    let opt_scale = if settings.movestogo == 0 {
        (0.214 * time as f64 / time_left as f64).min(0.025)
    } else {
        (0.88 * time as f64 / time_left as f64).min(0.95 / mtg as f64)
    };

    let optimum = (opt_scale * time_left as f64) as i64;
    let maximum = (time as f64 * 0.8) as i64 - overhead;
    (optimum, maximum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    fn settings_with_clock(time: i64, inc: i64, movestogo: i32) -> Settings {
        let mut s = Settings::new(Position::startpos());
        s.time = [time; 2];
        s.inc = [inc; 2];
        s.movestogo = movestogo;
        s
    }

    #[test]
    fn sudden_death_budget_is_a_fraction_of_the_clock() {
        let s = settings_with_clock(60_000, 0, 0);
        let (optimum, maximum) = calc_optimum_time(&s, Color::White);
        assert!(optimum > 0);
        assert!(optimum < 5_000);
        assert!(maximum <= 48_000);
        assert!(optimum < maximum);
    }

    #[test]
    fn movestogo_splits_the_clock() {
        let s = settings_with_clock(30_000, 0, 10);
        let (optimum, _) = calc_optimum_time(&s, Color::White);
        // Roughly a tenth of the remaining time, never more
        assert!(optimum <= 30_000 / 10);
        assert!(optimum > 500);
    }

    #[test]
    fn tiny_clock_stays_positive() {
        let s = settings_with_clock(50, 0, 0);
        let (optimum, _) = calc_optimum_time(&s, Color::White);
        assert!(optimum >= 0);
    }
}
