/// Outcome of one validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Improved,
    NoImprovement,
    Stop,
}

/// Stops training once validation accuracy has not improved for more than
/// `patience` consecutive epochs.
///
/// The best score starts at 0.0 and only a strictly higher score counts as
/// an improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_score: f64,
    best_epoch: Option<usize>,
    since_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        EarlyStopping {
            patience,
            best_score: 0.0,
            best_epoch: None,
            since_improvement: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, score: f64) -> Decision {
        if score > self.best_score {
            self.best_score = score;
            self.best_epoch = Some(epoch);
            self.since_improvement = 0;
            return Decision::Improved;
        }
        self.since_improvement += 1;
        if self.since_improvement > self.patience {
            Decision::Stop
        } else {
            Decision::NoImprovement
        }
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds scores until a stop and returns the epoch it happened at.
    fn stop_epoch(patience: usize, scores: impl IntoIterator<Item = f64>) -> Option<usize> {
        let mut es = EarlyStopping::new(patience);
        scores
            .into_iter()
            .enumerate()
            .find(|&(epoch, s)| es.observe(epoch, s) == Decision::Stop)
            .map(|(epoch, _)| epoch)
    }

    #[test]
    fn stops_patience_plus_one_epochs_after_last_improvement() {
        for patience in [0, 1, 3, 10] {
            let decreasing = (0..100).map(|i| 0.9 - i as f64 * 0.001);
            assert_eq!(stop_epoch(patience, decreasing), Some(patience + 1));
        }
    }

    #[test]
    fn improvement_resets_the_counter() {
        // Improves at epochs 0 and 2, then plateaus.
        let scores = [0.5, 0.4, 0.6, 0.6, 0.6, 0.6];
        assert_eq!(stop_epoch(2, scores), Some(5));
    }

    #[test]
    fn equal_score_is_not_an_improvement() {
        let mut es = EarlyStopping::new(5);
        assert_eq!(es.observe(0, 0.7), Decision::Improved);
        assert_eq!(es.observe(1, 0.7), Decision::NoImprovement);
        assert_eq!(es.best_epoch(), Some(0));
    }

    #[test]
    fn zero_accuracy_never_improves() {
        let mut es = EarlyStopping::new(0);
        assert_eq!(es.observe(0, 0.0), Decision::Stop);
        assert_eq!(es.best_epoch(), None);
    }
}
