//! Statevector simulation engine.
//!
//! Exact state evolution for the gate set emitted by the re-uploading
//! circuit. Wire 0 is the most significant bit of the basis index, so the
//! amplitude of `|q0 q1 … q(n-1)⟩` sits at index `q0·2^(n-1) + … + q(n-1)`.

use num_complex::Complex64;

use crate::circuit::{CircuitProgram, Gate};

/// A statevector representing a quantum state.
#[derive(Debug, Clone, PartialEq)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Evolve |0...0⟩ through every gate of a program.
    pub fn run(program: &CircuitProgram) -> Self {
        let mut sv = Self::new(program.num_qubits());
        for gate in program.gates() {
            sv.apply(gate);
        }
        sv
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Borrow the amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Take ownership of the amplitudes.
    pub fn into_amplitudes(self) -> Vec<Complex64> {
        self.amplitudes
    }

    /// Apply a single gate.
    pub fn apply(&mut self, gate: &Gate) {
        match *gate {
            Gate::Rz { qubit, angle } => self.apply_rz(qubit, angle),
            Gate::Ry { qubit, angle } => self.apply_ry(qubit, angle),
            Gate::Cx { control, target } => self.apply_cx(control, target),
        }
    }

    fn mask(&self, qubit: usize) -> usize {
        1 << (self.num_qubits - 1 - qubit)
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = self.mask(qubit);
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let mask = self.mask(qubit);
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask == 0 {
                *amp *= phase_0;
            } else {
                *amp *= phase_1;
            }
        }
    }

    // =========================================================================
    // Two-qubit gate implementations
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = self.mask(control);
        let tgt_mask = self.mask(target);
        for i in 0..self.amplitudes.len() {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }
}
