//! Formula pipeline.

use std::fmt;
use std::sync::Arc;

use auctioneer_models::{BidRule, KeywordBid};
use futures::{Stream, StreamExt};

use crate::formulas::{BidFormula, SearchBidFormula};

/// Ordered list of formulas folded over each keyword bid.
///
/// The output of one formula is the input of the next. Applying the
/// calculator to a stream is lazy and yields one bid per input bid.
#[derive(Clone)]
pub struct BidCalculator {
    formulas: Vec<Arc<dyn BidFormula>>,
}

impl Default for BidCalculator {
    fn default() -> Self {
        Self::empty().with_formula(SearchBidFormula)
    }
}

impl fmt::Debug for BidCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidCalculator")
            .field("formulas", &self.formula_names())
            .finish()
    }
}

impl BidCalculator {
    /// Calculator with no formulas; bids pass through unchanged.
    pub fn empty() -> Self {
        Self {
            formulas: Vec::new(),
        }
    }

    /// Append a formula to the end of the pipeline.
    pub fn with_formula(mut self, formula: impl BidFormula + 'static) -> Self {
        self.formulas.push(Arc::new(formula));
        self
    }

    pub fn formula_names(&self) -> Vec<&'static str> {
        self.formulas.iter().map(|f| f.name()).collect()
    }

    /// Fold one bid through every formula.
    pub fn calculate(&self, rule: &BidRule, bid: KeywordBid) -> KeywordBid {
        self.formulas
            .iter()
            .fold(bid, |bid, formula| formula.apply(rule, bid))
    }

    /// Recalculate a stream of bids. Errors pass through untouched.
    pub fn apply<S, E>(
        &self,
        rule: BidRule,
        bids: S,
    ) -> impl Stream<Item = Result<KeywordBid, E>> + Send + 'static
    where
        S: Stream<Item = Result<KeywordBid, E>> + Send + 'static,
    {
        let calculator = self.clone();
        bids.map(move |bid| bid.map(|bid| calculator.calculate(&rule, bid)))
    }
}
