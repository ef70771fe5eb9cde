// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Swappable allocation policies.
//!
//! The router's VC and switch allocation stages pick winners among competing
//! requesters through an [`Arbitrate`] policy. The default is round-robin
//! fairness; a weighted variant is available for asymmetric port service.

use weft_engine::types::SetupError;

/// Pick one winner from a request vector.
pub trait Arbitrate {
    /// Return the index of the granted requester, or `None` if nothing is
    /// requesting. A grant advances the policy's internal fairness state.
    fn arbitrate(&mut self, requests: &[bool]) -> Option<usize>;
}

/// Plain round-robin: the search starts one past the previous winner.
pub struct RoundRobinPolicy {
    candidate: usize,
}

impl RoundRobinPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self { candidate: 0 }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Arbitrate for RoundRobinPolicy {
    fn arbitrate(&mut self, requests: &[bool]) -> Option<usize> {
        let num_inputs = requests.len();
        for i in 0..num_inputs {
            let index = (i + self.candidate) % num_inputs;
            if requests[index] {
                self.candidate = (index + 1) % num_inputs;
                return Some(index);
            }
        }
        None
    }
}

/// Weighted round-robin: a requester holding unspent weight is preferred
/// over one that has used its allowance this sweep.
pub struct WeightedRoundRobinPolicy {
    candidate: usize,
    grants: Vec<usize>,
    weights: Vec<usize>,
}

impl WeightedRoundRobinPolicy {
    pub fn new(weights: Vec<usize>, num_inputs: usize) -> Result<Self, SetupError> {
        if weights.len() != num_inputs {
            return weft_engine::config_error!(
                "The number of weights must be equal to the number of inputs"
            );
        }

        Ok(Self {
            candidate: 0,
            grants: vec![0; num_inputs],
            weights,
        })
    }
}

impl Arbitrate for WeightedRoundRobinPolicy {
    fn arbitrate(&mut self, requests: &[bool]) -> Option<usize> {
        let num_inputs = requests.len();
        let mut selected = None;
        for i in 0..num_inputs {
            let index = (i + self.candidate) % num_inputs;
            if !requests[index] {
                continue;
            }
            if self.weights[index] > self.grants[index] {
                selected = Some(index);
                break;
            } else if selected.is_none() {
                selected = Some(index);
            }
        }
        if let Some(index) = selected {
            if self.weights[index] == self.grants[index] {
                self.grants[index] = 0;
            }
            self.grants[index] += 1;
            self.candidate = (index + 1) % num_inputs;
        }
        selected
    }
}

/// Build a policy by name. `weights` applies to `"weighted_round_robin"`
/// only; when absent every requester gets weight 1.
pub fn create_policy(
    name: &str,
    num_inputs: usize,
    weights: Option<Vec<usize>>,
) -> Result<Box<dyn Arbitrate>, SetupError> {
    match name {
        "round_robin" => Ok(Box::new(RoundRobinPolicy::new())),
        "weighted_round_robin" => {
            let weights = weights.unwrap_or_else(|| vec![1; num_inputs]);
            Ok(Box::new(WeightedRoundRobinPolicy::new(weights, num_inputs)?))
        }
        _ => weft_engine::config_error!(format!("unknown allocation policy '{name}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_rotates() {
        let mut policy = RoundRobinPolicy::new();
        let all = [true, true, true];
        assert_eq!(policy.arbitrate(&all), Some(0));
        assert_eq!(policy.arbitrate(&all), Some(1));
        assert_eq!(policy.arbitrate(&all), Some(2));
        assert_eq!(policy.arbitrate(&all), Some(0));
    }

    #[test]
    fn round_robin_skips_idle() {
        let mut policy = RoundRobinPolicy::new();
        assert_eq!(policy.arbitrate(&[false, true, false]), Some(1));
        assert_eq!(policy.arbitrate(&[true, false, true]), Some(2));
        assert_eq!(policy.arbitrate(&[true, false, true]), Some(0));
        assert_eq!(policy.arbitrate(&[false, false, false]), None);
    }

    #[test]
    fn weighted_grants_follow_the_weights() {
        let mut policy = WeightedRoundRobinPolicy::new(vec![2, 1], 2).unwrap();
        let all = [true, true];
        let mut grants = [0usize; 2];
        for _ in 0..30 {
            grants[policy.arbitrate(&all).unwrap()] += 1;
        }
        // Input 0 has twice the weight, so it gets two thirds of the grants.
        assert_eq!(grants, [20, 10]);
    }

    #[test]
    fn weight_length_is_checked() {
        assert!(WeightedRoundRobinPolicy::new(vec![1, 1], 3).is_err());
    }

    #[test]
    fn policy_names() {
        assert!(create_policy("round_robin", 4, None).is_ok());
        assert!(create_policy("weighted_round_robin", 4, None).is_ok());
        assert!(create_policy("lottery", 4, None).is_err());
    }
}
