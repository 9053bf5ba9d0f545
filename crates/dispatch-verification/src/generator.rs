//! Code generation for pickup and delivery proofs.
//!
//! Codes are always generated here, server-side; surfaces only relay them.

use rand::distr::Alphanumeric;
use rand::Rng;

/// Generates one-time verification codes.
pub struct CodeGenerator {
	/// Length of generated pickup codes.
	code_length: usize,
}

impl CodeGenerator {
	pub fn new(code_length: usize) -> Self {
		Self { code_length }
	}

	/// Produces a random alphanumeric pickup code, uppercased.
	///
	/// Unpredictable to third parties; comparison downstream is
	/// case-insensitive so uppercasing loses nothing.
	pub fn pickup_code(&self) -> String {
		let rng = rand::rng();
		rng.sample_iter(&Alphanumeric)
			.take(self.code_length)
			.map(char::from)
			.collect::<String>()
			.to_ascii_uppercase()
	}

	/// Produces a random 4-digit delivery OTP, zero-padded.
	pub fn delivery_otp(&self) -> String {
		let mut rng = rand::rng();
		format!("{:04}", rng.random_range(0..10_000))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pickup_code_shape() {
		let generator = CodeGenerator::new(8);
		for _ in 0..50 {
			let code = generator.pickup_code();
			assert_eq!(code.len(), 8);
			assert!(code
				.chars()
				.all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_lowercase()));
		}
	}

	#[test]
	fn test_delivery_otp_is_four_digits() {
		let generator = CodeGenerator::new(8);
		for _ in 0..50 {
			let otp = generator.delivery_otp();
			assert_eq!(otp.len(), 4);
			assert!(otp.chars().all(|c| c.is_ascii_digit()));
		}
	}
}
