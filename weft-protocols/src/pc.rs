// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The protocol-class to virtual-channel map.

use weft_engine::types::SetupError;

/// The VC range owned by one protocol class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcVcInfo {
    /// First VC of the class's contiguous range.
    pub base_vc: u32,
    /// Number of VCs in the range.
    pub num_vcs: u32,
}

/// The fixed map from protocol classes to virtual channels.
///
/// Classes own disjoint, contiguous ranges that together cover
/// `[0, num_vcs)`, so the reverse map `vc -> pc` is total. Deadlock freedom
/// in the fabric relies on no routing decision ever sending a flit outside
/// its class's range.
pub struct PcVcMap {
    pcs: Vec<PcVcInfo>,
    vc_to_pc: Vec<u32>,
}

impl PcVcMap {
    /// Build the map from the per-class VC counts, assigning ranges
    /// contiguously in class order.
    pub fn new(vcs_per_pc: &[u32]) -> Result<Self, SetupError> {
        if vcs_per_pc.is_empty() {
            weft_engine::config_error!("at least one protocol class is required");
        }

        let mut pcs = Vec::with_capacity(vcs_per_pc.len());
        let mut vc_to_pc = Vec::new();
        let mut base_vc = 0;
        for (pc, &num_vcs) in vcs_per_pc.iter().enumerate() {
            if num_vcs == 0 {
                weft_engine::config_error!(format!("protocol class {pc} has no VCs"));
            }
            pcs.push(PcVcInfo { base_vc, num_vcs });
            for _ in 0..num_vcs {
                vc_to_pc.push(pc as u32);
            }
            base_vc += num_vcs;
        }

        Ok(Self { pcs, vc_to_pc })
    }

    /// Number of protocol classes.
    pub fn num_pcs(&self) -> u32 {
        self.pcs.len() as u32
    }

    /// Total number of virtual channels.
    pub fn num_vcs(&self) -> u32 {
        self.vc_to_pc.len() as u32
    }

    /// The VC range of the given class.
    pub fn pc_vcs(&self, pc: u32) -> PcVcInfo {
        self.pcs[pc as usize]
    }

    /// The class owning the given VC.
    pub fn vc_to_pc(&self, vc: u32) -> u32 {
        self.vc_to_pc[vc as usize]
    }

    /// Whether `vc` lies in the range of class `pc`.
    pub fn vc_in_pc(&self, pc: u32, vc: u32) -> bool {
        let info = self.pcs[pc as usize];
        vc >= info.base_vc && vc < info.base_vc + info.num_vcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_contiguous_and_disjoint() {
        let map = PcVcMap::new(&[2, 3, 1]).unwrap();
        assert_eq!(map.num_pcs(), 3);
        assert_eq!(map.num_vcs(), 6);
        assert_eq!(map.pc_vcs(0), PcVcInfo { base_vc: 0, num_vcs: 2 });
        assert_eq!(map.pc_vcs(1), PcVcInfo { base_vc: 2, num_vcs: 3 });
        assert_eq!(map.pc_vcs(2), PcVcInfo { base_vc: 5, num_vcs: 1 });
    }

    #[test]
    fn reverse_map_is_total() {
        let map = PcVcMap::new(&[2, 3, 1]).unwrap();
        let pcs: Vec<u32> = (0..map.num_vcs()).map(|vc| map.vc_to_pc(vc)).collect();
        assert_eq!(pcs, vec![0, 0, 1, 1, 1, 2]);

        for vc in 0..map.num_vcs() {
            assert!(map.vc_in_pc(map.vc_to_pc(vc), vc));
        }
    }

    #[test]
    fn empty_classes_are_rejected() {
        assert!(PcVcMap::new(&[]).is_err());
        assert!(PcVcMap::new(&[2, 0, 1]).is_err());
    }
}
