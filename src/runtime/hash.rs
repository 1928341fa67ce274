//! 64-bit structural hash combinator: a square-pairing step folds two words
//! into one, and a splitmix64 finalizer scrambles the result.

fn pair(x: u64, y: u64) -> u64 {
    if x >= y {
        y.wrapping_mul(y).wrapping_add(x)
    } else {
        x.wrapping_mul(x).wrapping_add(x).wrapping_add(y)
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

pub fn combine(seed: u64, value: u64) -> u64 {
    splitmix64(pair(seed, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(combine(1, 2), combine(1, 2));
    }

    #[test]
    fn argument_order_matters() {
        assert_ne!(combine(1, 2), combine(2, 1));
    }

    #[test]
    fn seed_separates_kinds() {
        assert_ne!(combine(10, 0), combine(11, 0));
    }
}
