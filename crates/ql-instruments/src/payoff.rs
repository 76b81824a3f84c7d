//! Option payoffs.
//!
//! A payoff maps the price of the underlying at exercise to the amount
//! paid. The set of payoff kinds is closed, so they form a single enum and
//! engines match on it directly.

use ql_core::{ensure, errors::Result, fail, Real};
use std::fmt;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionType {
    /// A call option (right to buy).
    Call,
    /// A put option (right to sell).
    Put,
}

impl OptionType {
    /// +1 for Call, −1 for Put.
    pub fn sign(self) -> Real {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// How a basket payoff reduces several prices to one.
#[derive(Debug, Clone, PartialEq)]
pub enum BasketKind {
    /// Lowest price.
    Min,
    /// Highest price.
    Max,
    /// Weighted sum of the prices.
    Average {
        /// One weight per basket component.
        weights: Vec<Real>,
    },
    /// First price minus second price.
    Spread,
}

/// An option payoff.
#[derive(Debug, Clone, PartialEq)]
pub enum Payoff {
    /// `max(φ(S − K), 0)`.
    PlainVanilla {
        /// Call or put.
        option_type: OptionType,
        /// Strike.
        strike: Real,
    },
    /// `S · max(φ(1 − m), 0)` for moneyness `m`.
    PercentageStrike {
        /// Call or put.
        option_type: OptionType,
        /// Strike as a fraction of the underlying price.
        moneyness: Real,
    },
    /// Pays `cash_payoff` when `φ(S − K) > 0`.
    CashOrNothing {
        /// Call or put.
        option_type: OptionType,
        /// Strike.
        strike: Real,
        /// Amount paid in the money.
        cash_payoff: Real,
    },
    /// Pays `S` when `φ(S − K) > 0`.
    AssetOrNothing {
        /// Call or put.
        option_type: OptionType,
        /// Strike.
        strike: Real,
    },
    /// Pays `φ(S − K₂)` when `φ(S − K₁) ≥ 0`.
    Gap {
        /// Call or put.
        option_type: OptionType,
        /// Trigger strike `K₁`.
        strike: Real,
        /// Payoff strike `K₂`.
        second_strike: Real,
    },
    /// Pays `cash_payoff` when `K₁ ≤ S < K₂`.
    SuperShare {
        /// Lower bound.
        strike: Real,
        /// Upper bound.
        second_strike: Real,
        /// Amount paid inside the band.
        cash_payoff: Real,
    },
    /// Pays `S / K₁` when `K₁ ≤ S < K₂`.
    SuperFund {
        /// Lower bound.
        strike: Real,
        /// Upper bound.
        second_strike: Real,
    },
    /// Floating-strike payoff; the strike is only known at exercise.
    Floating {
        /// Call or put.
        option_type: OptionType,
    },
    /// A payoff applied to a combination of several prices.
    Basket {
        /// Reduction applied to the prices.
        kind: BasketKind,
        /// Payoff applied to the reduced price.
        base: Box<Payoff>,
    },
}

impl Payoff {
    /// Plain vanilla call or put.
    pub fn plain_vanilla(option_type: OptionType, strike: Real) -> Self {
        Payoff::PlainVanilla {
            option_type,
            strike,
        }
    }

    /// Percentage-strike payoff.
    pub fn percentage_strike(option_type: OptionType, moneyness: Real) -> Self {
        Payoff::PercentageStrike {
            option_type,
            moneyness,
        }
    }

    /// Cash-or-nothing digital.
    pub fn cash_or_nothing(option_type: OptionType, strike: Real, cash_payoff: Real) -> Self {
        Payoff::CashOrNothing {
            option_type,
            strike,
            cash_payoff,
        }
    }

    /// Asset-or-nothing digital.
    pub fn asset_or_nothing(option_type: OptionType, strike: Real) -> Self {
        Payoff::AssetOrNothing {
            option_type,
            strike,
        }
    }

    /// Gap payoff.
    pub fn gap(option_type: OptionType, strike: Real, second_strike: Real) -> Self {
        Payoff::Gap {
            option_type,
            strike,
            second_strike,
        }
    }

    /// Super-share payoff; the band must be non-empty.
    pub fn super_share(strike: Real, second_strike: Real, cash_payoff: Real) -> Result<Self> {
        ensure!(
            second_strike > strike,
            "second strike ({second_strike}) must be higher than first strike ({strike})"
        );
        Ok(Payoff::SuperShare {
            strike,
            second_strike,
            cash_payoff,
        })
    }

    /// Super-fund payoff; the band must be non-empty and above zero.
    pub fn super_fund(strike: Real, second_strike: Real) -> Result<Self> {
        ensure!(strike > 0.0, "strike ({strike}) must be positive");
        ensure!(
            second_strike > strike,
            "second strike ({second_strike}) must be higher than first strike ({strike})"
        );
        Ok(Payoff::SuperFund {
            strike,
            second_strike,
        })
    }

    /// Floating-strike payoff.
    pub fn floating(option_type: OptionType) -> Self {
        Payoff::Floating { option_type }
    }

    /// Basket payoff over `base`.
    pub fn basket(kind: BasketKind, base: Payoff) -> Self {
        Payoff::Basket {
            kind,
            base: Box::new(base),
        }
    }

    /// Amount paid for an underlying price.
    ///
    /// Floating payoffs need a strike as well; use
    /// [`floating_value`](Self::floating_value) for them.
    pub fn value(&self, price: Real) -> Result<Real> {
        let v = match *self {
            Payoff::PlainVanilla {
                option_type,
                strike,
            } => (option_type.sign() * (price - strike)).max(0.0),
            Payoff::PercentageStrike {
                option_type,
                moneyness,
            } => price * (option_type.sign() * (1.0 - moneyness)).max(0.0),
            Payoff::CashOrNothing {
                option_type,
                strike,
                cash_payoff,
            } => {
                if option_type.sign() * (price - strike) > 0.0 {
                    cash_payoff
                } else {
                    0.0
                }
            }
            Payoff::AssetOrNothing {
                option_type,
                strike,
            } => {
                if option_type.sign() * (price - strike) > 0.0 {
                    price
                } else {
                    0.0
                }
            }
            Payoff::Gap {
                option_type,
                strike,
                second_strike,
            } => {
                if option_type.sign() * (price - strike) >= 0.0 {
                    option_type.sign() * (price - second_strike)
                } else {
                    0.0
                }
            }
            Payoff::SuperShare {
                strike,
                second_strike,
                cash_payoff,
            } => {
                if price >= strike && price < second_strike {
                    cash_payoff
                } else {
                    0.0
                }
            }
            Payoff::SuperFund {
                strike,
                second_strike,
            } => {
                if price >= strike && price < second_strike {
                    price / strike
                } else {
                    0.0
                }
            }
            Payoff::Floating { .. } => fail!("floating payoff not handled"),
            Payoff::Basket { ref base, .. } => return base.value(price),
        };
        Ok(v)
    }

    /// Floating-strike payoff value given the strike fixed at exercise.
    pub fn floating_value(&self, price: Real, strike: Real) -> Result<Real> {
        match *self {
            Payoff::Floating { option_type } => {
                Ok((option_type.sign() * (price - strike)).max(0.0))
            }
            _ => fail!("{} is not a floating payoff", self.name()),
        }
    }

    /// Basket payoff value for a set of prices.
    pub fn basket_value(&self, prices: &[Real]) -> Result<Real> {
        let Payoff::Basket { kind, base } = self else {
            fail!("{} is not a basket payoff", self.name());
        };
        ensure!(!prices.is_empty(), "no prices given");
        let reduced = match kind {
            BasketKind::Min => prices.iter().copied().fold(Real::INFINITY, Real::min),
            BasketKind::Max => prices.iter().copied().fold(Real::NEG_INFINITY, Real::max),
            BasketKind::Average { weights } => {
                ensure!(
                    weights.len() == prices.len(),
                    "wrong number of prices: {} given, {} expected",
                    prices.len(),
                    weights.len()
                );
                weights.iter().zip(prices).map(|(w, p)| w * p).sum()
            }
            BasketKind::Spread => {
                ensure!(prices.len() == 2, "spread payoff needs exactly two prices");
                prices[0] - prices[1]
            }
        };
        base.value(reduced)
    }

    /// Short name of the payoff kind.
    pub fn name(&self) -> &'static str {
        match self {
            Payoff::PlainVanilla { .. } => "Vanilla",
            Payoff::PercentageStrike { .. } => "PercentageStrike",
            Payoff::CashOrNothing { .. } => "CashOrNothing",
            Payoff::AssetOrNothing { .. } => "AssetOrNothing",
            Payoff::Gap { .. } => "Gap",
            Payoff::SuperShare { .. } => "SuperShare",
            Payoff::SuperFund { .. } => "SuperFund",
            Payoff::Floating { .. } => "FloatingType",
            Payoff::Basket { kind, .. } => match kind {
                BasketKind::Min => "MinBasket",
                BasketKind::Max => "MaxBasket",
                BasketKind::Average { .. } => "AverageBasket",
                BasketKind::Spread => "SpreadBasket",
            },
        }
    }

    /// Human-readable description, e.g. `"Vanilla Call, 100 strike"`.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Call or put; super-share and super-fund payoffs count as calls.
    ///
    /// `None` for basket payoffs.
    pub fn option_type(&self) -> Option<OptionType> {
        match *self {
            Payoff::PlainVanilla { option_type, .. }
            | Payoff::PercentageStrike { option_type, .. }
            | Payoff::CashOrNothing { option_type, .. }
            | Payoff::AssetOrNothing { option_type, .. }
            | Payoff::Gap { option_type, .. }
            | Payoff::Floating { option_type } => Some(option_type),
            Payoff::SuperShare { .. } | Payoff::SuperFund { .. } => Some(OptionType::Call),
            Payoff::Basket { .. } => None,
        }
    }

    /// The strike of a striked payoff (the moneyness for percentage-strike
    /// payoffs, the trigger for gaps).
    pub fn strike(&self) -> Option<Real> {
        match *self {
            Payoff::PlainVanilla { strike, .. }
            | Payoff::CashOrNothing { strike, .. }
            | Payoff::AssetOrNothing { strike, .. }
            | Payoff::Gap { strike, .. }
            | Payoff::SuperShare { strike, .. }
            | Payoff::SuperFund { strike, .. } => Some(strike),
            Payoff::PercentageStrike { moneyness, .. } => Some(moneyness),
            Payoff::Floating { .. } | Payoff::Basket { .. } => None,
        }
    }

    /// Option type and strike together, for engines that need a striked
    /// payoff.
    pub fn striked(&self) -> Result<(OptionType, Real)> {
        match (self.option_type(), self.strike()) {
            (Some(option_type), Some(strike)) => Ok((option_type, strike)),
            _ => fail!("non-striked payoff given: {self}"),
        }
    }
}

impl fmt::Display for Payoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payoff::Floating { option_type } => write!(f, "{} {}", self.name(), option_type),
            Payoff::Basket { base, .. } => write!(f, "{} on {}", self.name(), base),
            _ => {
                if let (Some(option_type), Some(strike)) = (self.option_type(), self.strike()) {
                    write!(f, "{} {}, {} strike", self.name(), option_type, strike)?;
                }
                match *self {
                    Payoff::CashOrNothing { cash_payoff, .. } => {
                        write!(f, ", {cash_payoff} cash payoff")
                    }
                    Payoff::Gap { second_strike, .. } => {
                        write!(f, ", {second_strike} strike payoff")
                    }
                    Payoff::SuperShare {
                        second_strike,
                        cash_payoff,
                        ..
                    } => write!(f, ", {second_strike} second strike, {cash_payoff} amount"),
                    Payoff::SuperFund { second_strike, .. } => {
                        write!(f, ", {second_strike} second strike")
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}
