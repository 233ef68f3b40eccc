//! Armatures and pose rigs.
//!
//! # Pose graph
//!
//! The `EvalPose` component holds the pose-wide steps: init, IK init,
//! cleanup and done. IK solvers live in an `EvalPose` component named after
//! the root bone of their chain, so two constraints sharing a root share one
//! solver.
//!
//! Each pose channel gets a `Bone` component named after the bone, running
//! local transform, parenting, constraints and segments. Everything that
//! depends on a bone hooks up to that component.

use super::DepsgraphNodeBuilder;
use crate::builder::map::BuildTag;
use crate::graph::{ComponentKey, LinkedState, NodeType, OpCode, OperationKey};
use crate::scene::{
    ik_chain_root, spline_ik_chain_root, Bone, ConstraintKind, EntityData, EntityId, Object,
    PoseChannel,
};

impl<'a> DepsgraphNodeBuilder<'a> {
    /// Pose evaluation of an armature object.
    pub fn build_rig(&mut self, object_id: EntityId, object: &Object, armature: EntityId) {
        self.build_armature(armature);

        let op = self.add_operation_node(object_id, NodeType::EvalPose, OpCode::PoseInit, None);
        self.set_as_entry(op);
        self.add_operation_node(object_id, NodeType::EvalPose, OpCode::PoseInitIk, None);
        self.add_operation_node(object_id, NodeType::EvalPose, OpCode::PoseCleanup, None);
        let op = self.add_operation_node(object_id, NodeType::EvalPose, OpCode::PoseDone, None);
        self.set_as_exit(op);

        for (index, channel) in object.pose.iter().enumerate() {
            let bone = ComponentKey::new(NodeType::Bone, &channel.name);
            let op = self.add_operation_node(object_id, bone.clone(), OpCode::BoneLocal, None);
            self.set_as_entry(op);
            self.add_operation_node(object_id, bone.clone(), OpCode::BonePoseParent, None);
            // No-op, simplifies relations.
            self.add_operation_node(object_id, bone.clone(), OpCode::BoneReady, None);
            let mut exit = self.add_operation_node(object_id, bone.clone(), OpCode::BoneDone, None);
            if channel.has_bbone() {
                exit = self.add_operation_node(object_id, bone, OpCode::BoneSegments, None);
            }
            self.set_as_exit(exit);

            if !channel.properties.is_empty() {
                self.build_idproperties(&channel.properties);
                self.add_operation_node(
                    object_id,
                    NodeType::Parameters,
                    OperationKey::new(OpCode::ParametersEval, &channel.name, -1),
                    None,
                );
            }
            if !channel.constraints.is_empty() {
                self.build_pose_constraints(object_id, channel);
            }
            for constraint in &channel.constraints {
                match constraint.kind {
                    ConstraintKind::Kinematic {
                        chain_length,
                        use_tip,
                    } => {
                        if let Some(root) = ik_chain_root(&object.pose, index, chain_length, use_tip) {
                            self.build_solver(object_id, &object.pose[root], OpCode::PoseIkSolver);
                        }
                    }
                    ConstraintKind::SplineIk { chain_length } => {
                        let root = spline_ik_chain_root(&object.pose, index, chain_length);
                        self.build_solver(object_id, &object.pose[root], OpCode::PoseSplineIkSolver);
                    }
                    ConstraintKind::Generic => {}
                }
            }
            if let Some(shape) = channel.custom_shape {
                self.build_object(None, shape, LinkedState::Indirectly, false);
            }
        }
    }

    fn build_pose_constraints(&mut self, object_id: EntityId, channel: &PoseChannel) {
        for constraint in &channel.constraints {
            for &target in &constraint.targets {
                self.build_id(target);
            }
        }
        self.add_operation_node(
            object_id,
            ComponentKey::new(NodeType::Bone, &channel.name),
            OpCode::BoneConstraints,
            None,
        );
    }

    /// One solver per chain root.
    fn build_solver(&mut self, object_id: EntityId, root: &PoseChannel, opcode: OpCode) {
        let component = ComponentKey::new(NodeType::EvalPose, &root.name);
        if self.has_operation_node(object_id, component.clone(), opcode) {
            return;
        }
        self.add_operation_node(object_id, component, opcode, None);
    }

    pub fn build_armature(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Armature(armature) = &entity.data else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        self.add_operation_node(id, NodeType::Armature, OpCode::ArmatureEval, None);
        self.build_armature_bones(&armature.bones);
    }

    fn build_armature_bones(&mut self, bones: &[Bone]) {
        for bone in bones {
            self.build_idproperties(&bone.properties);
            self.build_armature_bones(&bone.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Depsgraph;
    use crate::scene::{Armature, Constraint, Entity, IdProperty, Main, ObjectType, PropertyValue};

    fn rig(main: &mut Main, pose: Vec<PoseChannel>) -> EntityId {
        let armature = main.add(Entity::new("Armature", EntityData::Armature(Armature::default())));
        let mut object = Object::new(ObjectType::Armature).with_data(armature);
        object.pose = pose;
        main.add(Entity::new("Rig", EntityData::Object(object)))
    }

    #[test]
    fn bone_components_per_channel() {
        let mut main = Main::new();
        let mut forearm = PoseChannel::new("Forearm").with_parent("UpperArm");
        forearm.bbone_segments = 4;
        let object = rig(&mut main, vec![PoseChannel::new("UpperArm"), forearm]);

        let mut graph = Depsgraph::default();
        let mut builder = DepsgraphNodeBuilder::new(&main, &mut graph);
        builder.build_object(None, object, LinkedState::Indirectly, true);

        let upper = graph.find_component(object, NodeType::Bone, "UpperArm").unwrap();
        assert_eq!(upper.entry_operation().unwrap().opcode(), OpCode::BoneLocal);
        assert_eq!(upper.exit_operation().unwrap().opcode(), OpCode::BoneDone);
        let fore = graph.find_component(object, NodeType::Bone, "Forearm").unwrap();
        assert_eq!(fore.exit_operation().unwrap().opcode(), OpCode::BoneSegments);

        let pose = graph.find_component(object, NodeType::EvalPose, "").unwrap();
        assert_eq!(pose.entry_operation().unwrap().opcode(), OpCode::PoseInit);
        assert_eq!(pose.exit_operation().unwrap().opcode(), OpCode::PoseDone);
    }

    #[test]
    fn ik_solver_added_once_per_root() {
        let mut main = Main::new();
        let ik = || {
            Constraint::new(
                "IK",
                ConstraintKind::Kinematic {
                    chain_length: 0,
                    use_tip: true,
                },
            )
        };
        let mut hand = PoseChannel::new("Hand").with_parent("Forearm");
        hand.constraints.push(ik());
        let mut finger = PoseChannel::new("Finger").with_parent("Hand");
        finger.constraints.push(ik());
        let object = rig(
            &mut main,
            vec![
                PoseChannel::new("Shoulder"),
                PoseChannel::new("Forearm").with_parent("Shoulder"),
                hand,
                finger,
            ],
        );

        let mut graph = Depsgraph::default();
        let mut builder = DepsgraphNodeBuilder::new(&main, &mut graph);
        builder.build_object(None, object, LinkedState::Indirectly, true);

        let solver = graph.find_component(object, NodeType::EvalPose, "Shoulder").unwrap();
        assert_eq!(solver.len(), 1);
        assert!(solver.find_operation(OpCode::PoseIkSolver, "", -1).is_some());
        assert!(graph
            .find_operation(object, NodeType::Bone, "Hand", OpCode::BoneConstraints, "", -1)
            .is_some());
    }

    #[test]
    fn bone_properties_get_parameters() {
        let mut main = Main::new();
        let mut hand = PoseChannel::new("Hand");
        hand.properties.push(IdProperty::new("grip", PropertyValue::Float(0.5)));
        let object = rig(&mut main, vec![hand]);

        let mut graph = Depsgraph::default();
        let mut builder = DepsgraphNodeBuilder::new(&main, &mut graph);
        builder.build_object(None, object, LinkedState::Indirectly, true);

        assert!(graph
            .find_operation(object, NodeType::Parameters, "", OpCode::ParametersEval, "Hand", -1)
            .is_some());
        assert!(graph
            .find_operation(object, NodeType::Parameters, "", OpCode::ParametersEval, "", -1)
            .is_some());
    }
}
