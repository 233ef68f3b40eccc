//! Scene aspects and the scene-wide data-blocks: masks, clips, sounds,
//! simulations and cache files.
//!
//! A scene is reached in several roles (the view layer's own scene, a
//! sequencer strip, a compositor node, a background set), so each aspect
//! carries its own [`BuildTag`] instead of the scene being built once as a
//! whole.

use super::DepsgraphNodeBuilder;
use crate::builder::map::BuildTag;
use crate::graph::{LinkedState, NodeType, OpCode};
use crate::scene::{EntityData, EntityId, ObjectType, Strip};

impl<'a> DepsgraphNodeBuilder<'a> {
    pub fn build_scene_parameters(&mut self, scene_id: EntityId) {
        if self.built_map.check_is_built_and_tag(scene_id, BuildTag::PARAMETERS) {
            return;
        }
        let Some(entity) = self.entity(scene_id) else {
            return;
        };
        let Some(scene) = entity.as_scene() else {
            return;
        };
        self.build_parameters(scene_id);
        self.build_idproperties(&entity.properties);
        self.add_operation_node(scene_id, NodeType::Parameters, OpCode::SceneEval, None);
        // The compositor tree must exist as a relation target even when the
        // compositor itself is not evaluated.
        if let Some(tree) = scene.compositor {
            self.build_nodetree(tree);
        }
        for &camera in &scene.marker_cameras {
            self.build_object(None, camera, LinkedState::Indirectly, false);
        }
    }

    pub fn build_scene_compositor(&mut self, scene_id: EntityId) {
        if self.built_map.check_is_built_and_tag(scene_id, BuildTag::SCENE_COMPOSITOR) {
            return;
        }
        let Some(scene) = self.entity(scene_id).and_then(|entity| entity.as_scene()) else {
            return;
        };
        if let Some(tree) = scene.compositor {
            self.build_nodetree(tree);
        }
    }

    pub fn build_scene_sequencer(&mut self, scene_id: EntityId) {
        let Some(scene) = self.entity(scene_id).and_then(|entity| entity.as_scene()) else {
            return;
        };
        let Some(editor) = &scene.sequence_editor else {
            return;
        };
        if self.built_map.check_is_built_and_tag(scene_id, BuildTag::SCENE_SEQUENCER) {
            return;
        }
        self.build_scene_audio(scene_id);
        self.add_operation_node(scene_id, NodeType::Sequencer, OpCode::SequencesEval, None);

        self.build_sequencer_strips(&editor.strips);
    }

    /// Strips in sequencer order, meta strips before their content.
    fn build_sequencer_strips(&mut self, strips: &[Strip]) {
        for strip in strips {
            self.build_idproperties(&strip.properties);
            if let Some(sound) = strip.sound {
                self.build_sound(sound);
            }
            if let Some(scene) = strip.scene {
                self.build_scene_parameters(scene);
                if strip.use_scene_strips {
                    self.build_scene_sequencer(scene);
                }
                self.build_scene_speakers(scene);
            }
            self.build_sequencer_strips(&strip.children);
        }
    }

    pub fn build_scene_audio(&mut self, scene_id: EntityId) {
        if self.built_map.check_is_built_and_tag(scene_id, BuildTag::SCENE_AUDIO) {
            return;
        }
        let op = self.add_operation_node(scene_id, NodeType::Audio, OpCode::AudioEntry, None);
        self.set_as_entry(op);
        self.add_operation_node(scene_id, NodeType::Audio, OpCode::SoundEval, None);
        self.add_operation_node(scene_id, NodeType::Audio, OpCode::AudioVolume, None);
    }

    /// Speakers of a scene pulled in through a strip. They are not part of
    /// the view layer being built, so they get no base.
    pub fn build_scene_speakers(&mut self, scene_id: EntityId) {
        let Some(scene) = self.entity(scene_id).and_then(|entity| entity.as_scene()) else {
            return;
        };
        let Some(view_layer) = scene.default_view_layer() else {
            return;
        };
        let render = self.is_render();
        for base in &view_layer.bases {
            if !base.is_enabled(render) {
                continue;
            }
            let is_speaker = self
                .main
                .get(base.object)
                .and_then(|entity| entity.as_object())
                .is_some_and(|object| object.object_type == ObjectType::Speaker);
            if is_speaker {
                self.build_object(None, base.object, LinkedState::Indirectly, true);
            }
        }
    }

    pub fn build_mask(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Mask(mask) = &entity.data else {
            return;
        };
        self.ensure_cow_id(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        // Animation of the mask's own shape keys.
        self.add_operation_node(id, NodeType::Animation, OpCode::MaskAnimation, None);
        self.add_operation_node(id, NodeType::Parameters, OpCode::MaskEval, None);
        let parents = mask
            .layers
            .iter()
            .flat_map(|layer| &layer.splines)
            .flat_map(|spline| spline.point_parents.iter().flatten());
        for &parent in parents {
            self.build_id(parent);
        }
    }

    pub fn build_movieclip(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.ensure_cow_id(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        self.add_operation_node(id, NodeType::Parameters, OpCode::MovieclipEval, None);
        self.add_operation_node(id, NodeType::BatchCache, OpCode::MovieclipSelectUpdate, None);
    }

    pub fn build_speaker(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Speaker(speaker) = &entity.data else {
            return;
        };
        self.build_idproperties(&entity.properties);
        self.add_operation_node(id, NodeType::Audio, OpCode::SpeakerEval, None);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(sound) = speaker.sound {
            self.build_sound(sound);
        }
    }

    pub fn build_sound(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.add_id_node(id);
        self.add_operation_node(id, NodeType::Audio, OpCode::SoundEval, None);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
    }

    pub fn build_simulation(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        let EntityData::Simulation(simulation) = &entity.data else {
            return;
        };
        self.add_id_node(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        if let Some(tree) = simulation.node_tree {
            self.build_nodetree(tree);
        }
        self.add_operation_node(id, NodeType::Simulation, OpCode::SimulationEval, None);
    }

    pub fn build_cachefile(&mut self, id: EntityId) {
        if self.built_map.check_is_built_and_tag(id, BuildTag::COMPLETE) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };
        self.add_id_node(id);
        self.build_idproperties(&entity.properties);
        self.build_animdata(id);
        self.build_parameters(id);
        self.add_operation_node(id, NodeType::Cache, OpCode::FileCacheUpdate, None);
    }
}
