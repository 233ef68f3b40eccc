//! Integration Tests for the Node Builder
//!
//! These tests build whole scenes through the public entry points and check
//! what survives a rebuild: duplicates, update tags and visibility.

use depsgraph_core::builder::{BuildContext, DepsgraphNodeBuilder};
use depsgraph_core::config::{BuildConfig, EvaluationMode};
use depsgraph_core::debug::consistency_check;
use depsgraph_core::graph::{
    ComponentKey, CustomDataMasks, Depsgraph, EvalContext, LinkedState, NodeType, OpCode,
    OperationFlags, OperationKey, RecalcFlags, UpdateSource,
};
use depsgraph_core::pipeline::{BuildPipeline, FromIdsPipeline, ViewLayerPipeline};
use depsgraph_core::scene::{
    AnimData, Armature, Base, Bone, Collection, Constraint, ConstraintKind, DriverVariable, Entity,
    EntityData, EntityId, FCurve, Geometry, GeometryKind, IdType, LayerCollection, Main, Material,
    Modifier, NodeTree, NodeTreeType, Object, ObjectType, ParticleSettings, ParticleSystem,
    PoseChannel, Scene, TreeNode, ViewLayer, World,
};

const SCENE_JSON: &str = r#"{
    "entities": [
        {
            "id": 1,
            "name": "Scene",
            "data": {
                "Scene": {
                    "camera": 3,
                    "view_layers": [
                        { "name": "ViewLayer", "bases": [{ "object": 2 }, { "object": 3 }] }
                    ]
                }
            }
        },
        { "id": 2, "name": "Cube", "data": { "Object": { "object_type": "Mesh", "data": 4 } } },
        { "id": 3, "name": "Camera", "data": { "Object": { "object_type": "Camera", "data": 5 } } },
        { "id": 4, "name": "Cube", "data": { "Geometry": { "kind": "Mesh" } } },
        { "id": 5, "name": "Camera", "data": { "Camera": {} } }
    ]
}"#;

fn load_scene() -> (Main, EntityId) {
    let main = Main::from_json(SCENE_JSON).unwrap();
    let scene = main.find_by_name(IdType::Scene, "Scene").unwrap();
    (main, scene)
}

/// Run one build pass by hand, the way a pipeline does.
fn build_with(main: &Main, graph: &mut Depsgraph, f: impl FnOnce(&mut DepsgraphNodeBuilder<'_>)) {
    {
        let mut builder = DepsgraphNodeBuilder::new(main, graph);
        builder.begin_build();
        f(&mut builder);
        builder.end_build();
    }
    graph.finalize_build();
}

fn object(main: &mut Main, name: &str, object: Object) -> EntityId {
    main.add(Entity::new(name, EntityData::Object(object)))
}

fn scene_with_bases(main: &mut Main, objects: &[EntityId]) -> EntityId {
    main.add(Entity::new(
        "Scene",
        EntityData::Scene(Scene {
            view_layers: vec![ViewLayer {
                name: "ViewLayer".into(),
                bases: objects.iter().copied().map(Base::new).collect(),
                ..ViewLayer::default()
            }],
            ..Scene::default()
        }),
    ))
}

/// Test that a scene description loads and builds a graph for every object.
#[test]
fn scene_loaded_from_json_builds() {
    let (main, scene) = load_scene();
    let cube = main.find_by_name(IdType::Object, "Cube").unwrap();
    let mesh = main.find_by_name(IdType::Mesh, "Cube").unwrap();

    let mut graph = Depsgraph::default();
    let report = ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

    assert_eq!(report.stats.id_nodes, 5);
    assert!(graph.find_id_node(mesh).is_some());
    assert!(graph
        .find_operation(cube, NodeType::Transform, "", OpCode::TransformFinal, "", -1)
        .is_some_and(|op| op.is_exit()));
    assert!(consistency_check(&graph).is_ok());
}

/// Test that an expanded duplicate of a visible object keeps its address
/// across a rebuild and is not flagged for an update.
#[test]
fn visible_duplicates_survive_rebuild() {
    let (main, scene) = load_scene();
    let cube = main.find_by_name(IdType::Object, "Cube").unwrap();
    let pipeline = ViewLayerPipeline::new(scene, 0);

    let mut graph = Depsgraph::default();
    pipeline.build(&main, &mut graph);
    assert!(graph.evaluate_copy_on_write(&main) > 0);
    let before = graph.get_cow_id(cube).unwrap().as_ptr();

    let report = pipeline.build(&main, &mut graph);

    let cow = graph.get_cow_id(cube).unwrap();
    assert_eq!(cow.as_ptr(), before);
    assert!(cow.is_expanded());
    assert!(!cow.recalc().contains(RecalcFlags::COPY_ON_WRITE));
    assert_eq!(report.stats.entry_tags, 0);
    assert!(consistency_check(&graph).is_ok());
}

/// Test that a duplicate that was never expanded is not carried over.
#[test]
fn hidden_object_duplicate_is_not_expanded() {
    let mut main = Main::new();
    let shown = object(&mut main, "Shown", Object::new(ObjectType::Empty));
    let hidden = object(&mut main, "Hidden", Object::new(ObjectType::Empty));
    let collection = main.add(Entity::new(
        "Hidden",
        EntityData::Collection(Collection {
            hide_viewport: true,
            ..Collection::new().with_objects([hidden])
        }),
    ));

    let mut graph = Depsgraph::default();
    for pass in 0..2 {
        build_with(&main, &mut graph, |builder| {
            builder.build_object(Some(0), shown, LinkedState::Directly, true);
            builder.build_collection(None, collection, &BuildContext::root());
        });
        if pass == 0 {
            graph.evaluate_copy_on_write(&main);
            assert_eq!(graph.find_id_node(hidden).unwrap().visible_components_mask, 0);
        }
        assert!(!graph.get_cow_id(hidden).unwrap().is_expanded());
    }
    assert!(graph.get_cow_id(shown).unwrap().is_expanded());
}

/// Test that an update tag set before a rebuild is replayed on the new node.
#[test]
fn entry_tags_are_replayed() {
    let (main, scene) = load_scene();
    let cube = main.find_by_name(IdType::Object, "Cube").unwrap();
    let pipeline = ViewLayerPipeline::new(scene, 0);

    let mut graph = Depsgraph::default();
    pipeline.build(&main, &mut graph);
    let op = graph
        .find_operation_ref(cube, NodeType::Transform, "", OpCode::TransformLocal, "", -1)
        .unwrap();
    graph.tag_operation(op, UpdateSource::UserEdit);

    let report = pipeline.build(&main, &mut graph);

    assert_eq!(report.saved_entry_tags, 1);
    let op = graph
        .find_operation_by_key(
            cube,
            &ComponentKey::new(NodeType::Transform, ""),
            &OperationKey::new(OpCode::TransformLocal, "", -1),
        )
        .unwrap();
    assert!(op.flags.contains(OperationFlags::USER_MODIFIED));
    assert!(op.needs_update());
    assert_eq!(report.stats.entry_tags, 1);
}

/// Test that a saved tag whose node is gone is dropped silently.
#[test]
fn entry_tag_of_removed_object_is_dropped() {
    let mut main = Main::new();
    let kept = object(&mut main, "Kept", Object::new(ObjectType::Empty));
    let removed = object(&mut main, "Removed", Object::new(ObjectType::Empty));
    let scene = scene_with_bases(&mut main, &[kept, removed]);

    let mut graph = Depsgraph::default();
    ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);
    let op = graph
        .find_operation_ref(removed, NodeType::Transform, "", OpCode::TransformLocal, "", -1)
        .unwrap();
    graph.tag_operation(op, UpdateSource::UserEdit);

    if let EntityData::Scene(data) = &mut main.get_mut(scene).unwrap().data {
        data.view_layers[0].bases.pop();
    }
    let report = ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

    assert_eq!(report.saved_entry_tags, 1);
    assert!(graph.find_id_node(removed).is_none());
    assert_eq!(report.stats.entry_tags, 0);
}

/// Test that a duplicate still pointing at data the graph dropped is tagged
/// for a copy-on-write update, and is clean again once evaluated.
#[test]
fn stale_duplicate_references_are_tagged() {
    let (mut main, scene) = load_scene();
    let cube = main.find_by_name(IdType::Object, "Cube").unwrap();
    let pipeline = ViewLayerPipeline::new(scene, 0);

    let mut graph = Depsgraph::default();
    pipeline.build(&main, &mut graph);
    graph.evaluate_copy_on_write(&main);

    if let EntityData::Object(ob) = &mut main.get_mut(cube).unwrap().data {
        ob.data = None;
    }
    let report = pipeline.build(&main, &mut graph);

    let id_node = graph.find_id_node(cube).unwrap();
    assert!(id_node.recalc.contains(RecalcFlags::COPY_ON_WRITE));
    assert!(id_node
        .id_cow()
        .unwrap()
        .recalc()
        .contains(RecalcFlags::COPY_ON_WRITE));
    assert!(report.stats.entry_tags >= 1);

    graph.evaluate_copy_on_write(&main);
    assert!(!graph
        .get_cow_id(cube)
        .unwrap()
        .recalc()
        .contains(RecalcFlags::COPY_ON_WRITE));
}

/// Test that an object reached through a visible and a hidden collection is
/// visible, whichever collection is built first.
#[test]
fn object_reached_twice_stays_visible() {
    for visible_first in [true, false] {
        let mut main = Main::new();
        let obj = object(&mut main, "Obj", Object::new(ObjectType::Empty));
        let child = object(
            &mut main,
            "Child",
            Object::new(ObjectType::Empty).with_parent(obj),
        );
        let shown = main.add(Entity::new(
            "Shown",
            EntityData::Collection(Collection::new().with_objects([obj])),
        ));
        let hidden = main.add(Entity::new(
            "Hidden",
            EntityData::Collection(Collection {
                hide_viewport: true,
                ..Collection::new().with_objects([child])
            }),
        ));

        let mut graph = Depsgraph::default();
        build_with(&main, &mut graph, |builder| {
            let order = if visible_first {
                [shown, hidden]
            } else {
                [hidden, shown]
            };
            for collection in order {
                builder.build_collection(None, collection, &BuildContext::root());
            }
        });

        let node = graph.find_id_node(obj).unwrap();
        assert!(node.is_directly_visible, "visible_first = {visible_first}");
        assert_eq!(node.linked_state, LinkedState::Indirectly);
        assert!(!graph.find_id_node(child).unwrap().is_directly_visible);
    }
}

/// Test that the most direct link wins when an object is reached both as a
/// parent and through its own base.
#[test]
fn most_direct_link_wins() {
    let mut main = Main::new();
    let parent = object(&mut main, "Parent", Object::new(ObjectType::Empty));
    let child = object(
        &mut main,
        "Child",
        Object::new(ObjectType::Empty).with_parent(parent),
    );
    let helper = object(&mut main, "Helper", Object::new(ObjectType::Empty));
    let rig = object(
        &mut main,
        "Rig",
        Object::new(ObjectType::Empty).with_parent(helper),
    );
    let scene = scene_with_bases(&mut main, &[child, parent, rig]);

    let mut graph = Depsgraph::default();
    ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

    let parent_node = graph.find_id_node(parent).unwrap();
    assert_eq!(parent_node.linked_state, LinkedState::Directly);
    assert!(parent_node.has_base);
    let helper_node = graph.find_id_node(helper).unwrap();
    assert_eq!(helper_node.linked_state, LinkedState::Indirectly);
    assert!(!helper_node.has_base);
}

/// Test that a collection first reached hidden is re-expanded once it is
/// reached visible, promoting its objects.
#[test]
fn collection_becomes_visible_on_second_visit() {
    let mut main = Main::new();
    let ob = object(&mut main, "Ob", Object::new(ObjectType::Empty));
    let collection = main.add(Entity::new(
        "Props",
        EntityData::Collection(Collection::new().with_objects([ob])),
    ));

    let mut graph = Depsgraph::default();
    build_with(&main, &mut graph, |builder| {
        // Instanced by a hidden object.
        builder.build_collection(None, collection, &BuildContext::instanced(false));
        assert!(!builder.graph().find_id_node(ob).unwrap().is_directly_visible);
        builder.build_collection(None, collection, &BuildContext::root());
    });

    let node = graph.find_id_node(collection).unwrap();
    assert!(node.is_directly_visible);
    assert!(node.is_collection_fully_expanded);
    assert!(graph.find_id_node(ob).unwrap().is_directly_visible);
    assert_ne!(graph.find_id_node(ob).unwrap().visible_components_mask, 0);
}

/// Test that a collection built from the layer walk leaves its content to it.
#[test]
fn layer_collection_does_not_expand_content() {
    let mut main = Main::new();
    let ob = object(&mut main, "Ob", Object::new(ObjectType::Empty));
    let collection = main.add(Entity::new(
        "Props",
        EntityData::Collection(Collection::new().with_objects([ob])),
    ));
    let scene = main.add(Entity::new(
        "Scene",
        EntityData::Scene(Scene {
            view_layers: vec![ViewLayer {
                layer_collections: vec![LayerCollection::new(collection)],
                ..ViewLayer::default()
            }],
            ..Scene::default()
        }),
    ));

    let mut graph = Depsgraph::default();
    ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

    let node = graph.find_id_node(collection).unwrap();
    assert!(!node.is_collection_fully_expanded);
    assert!(graph.find_id_node(ob).is_none());
}

/// Test that two drivers on the same property share one operation.
#[test]
fn identical_drivers_share_operation() {
    let mut main = Main::new();
    let target = object(&mut main, "Target", Object::new(ObjectType::Empty));
    let driver =
        FCurve::new("location", 0).with_variable(DriverVariable::single("x", target, "location"));
    let ob = main.add(
        Entity::new("Driven", EntityData::Object(Object::new(ObjectType::Empty))).with_anim_data(
            AnimData {
                drivers: vec![driver.clone(), driver],
                ..AnimData::default()
            },
        ),
    );

    let mut graph = Depsgraph::default();
    FromIdsPipeline::new([ob]).build(&main, &mut graph);

    let parameters = graph.find_component(ob, NodeType::Parameters, "").unwrap();
    let drivers = parameters
        .operations()
        .filter(|op| op.opcode() == OpCode::Driver)
        .count();
    assert_eq!(drivers, 1);
    assert!(graph.find_component(ob, NodeType::Animation, "").is_none());
    assert!(graph.find_id_node(target).is_some());
}

/// Test that data-blocks without evaluated duplicates get no copy-on-write
/// operation, now or in the rebuild snapshot.
#[test]
fn interface_datablocks_have_no_duplicate() {
    let mut main = Main::new();
    let screen = main.add(Entity::new("Layout", EntityData::Generic(IdType::Screen)));

    let mut graph = Depsgraph::default();
    FromIdsPipeline::new([screen]).build(&main, &mut graph);
    assert!(graph.get_cow_id(screen).is_none());
    assert!(graph
        .find_operation(screen, NodeType::CopyOnWrite, "", OpCode::CopyOnWrite, "", -1)
        .is_none());
    assert!(graph
        .find_operation(screen, NodeType::Parameters, "", OpCode::ParametersEval, "", -1)
        .is_some());

    let mut builder = DepsgraphNodeBuilder::new(&main, &mut graph);
    builder.begin_build();
    assert!(builder.id_info(screen).unwrap().id_cow().is_none());
    builder.end_build();
}

/// Test that adding an id node twice returns the same node and duplicate.
#[test]
fn add_id_node_is_idempotent() {
    let mut main = Main::new();
    let ob = object(&mut main, "Ob", Object::new(ObjectType::Empty));

    let mut graph = Depsgraph::default();
    build_with(&main, &mut graph, |builder| {
        let first = builder.add_id_node(ob).unwrap();
        let cow = builder.get_cow_id(ob).unwrap();
        let second = builder.add_id_node(ob).unwrap();
        assert_eq!(first, second);
        assert!(builder.get_cow_id(ob).unwrap().upgrade().is_some());
        assert!(cow.is_alive());
        assert_eq!(builder.graph().id_node_count(), 1);
    });
}

/// Test that a scene touching most builders produces a consistent graph.
#[test]
fn rich_scene_is_consistent() {
    let mut main = Main::new();

    let tree = main.add(Entity::new(
        "Shader",
        EntityData::NodeTree(NodeTree::new(NodeTreeType::Shader).with_node(TreeNode::new("BSDF"))),
    ));
    let material = main.add(Entity::new(
        "Metal",
        EntityData::Material(Material {
            node_tree: Some(tree),
        }),
    ));
    let world = main.add(Entity::new("World", EntityData::World(World::default())));
    let mesh = main.add(Entity::new(
        "Body",
        EntityData::Geometry(Geometry {
            materials: vec![Some(material), None],
            ..Geometry::new(GeometryKind::Mesh)
        }),
    ));
    let armature = main.add(Entity::new(
        "Skeleton",
        EntityData::Armature(Armature {
            bones: vec![Bone {
                name: "root".into(),
                children: vec![Bone {
                    name: "arm".into(),
                    ..Bone::default()
                }],
                ..Bone::default()
            }],
        }),
    ));
    let settings = main.add(Entity::new(
        "Sparks",
        EntityData::Particle(ParticleSettings::default()),
    ));

    let target = object(&mut main, "Target", Object::new(ObjectType::Empty));
    let mut rig = Object::new(ObjectType::Armature).with_data(armature);
    rig.pose = vec![
        PoseChannel::new("root"),
        PoseChannel {
            constraints: vec![Constraint {
                targets: vec![target],
                ..Constraint::new(
                    "IK",
                    ConstraintKind::Kinematic {
                        chain_length: 0,
                        use_tip: true,
                    },
                )
            }],
            ..PoseChannel::new("arm").with_parent("root")
        },
    ];
    let rig = object(&mut main, "Rig", rig);

    let mut body = Object::new(ObjectType::Mesh).with_data(mesh).with_parent(rig);
    body.modifiers = vec![Modifier {
        references: vec![rig],
        ..Modifier::new("Armature")
    }];
    body.particle_systems = vec![ParticleSystem {
        name: "Sparks".into(),
        settings,
        targets: Vec::new(),
    }];
    body.constraints = vec![Constraint::new("Track", ConstraintKind::Generic)];
    let body = main.add(
        Entity::new("Body", EntityData::Object(body)).with_anim_data(AnimData {
            drivers: vec![FCurve::new("location", 2)],
            ..AnimData::default()
        }),
    );

    let scene = main.add(Entity::new(
        "Scene",
        EntityData::Scene(Scene {
            world: Some(world),
            view_layers: vec![ViewLayer {
                name: "ViewLayer".into(),
                bases: vec![Base::new(body), Base::new(rig), Base::new(target)],
                ..ViewLayer::default()
            }],
            ..Scene::default()
        }),
    ));

    let mut graph = Depsgraph::default();
    let pipeline = ViewLayerPipeline::new(scene, 0);
    pipeline.build(&main, &mut graph);
    assert!(consistency_check(&graph).is_ok());
    for id in [tree, material, world, mesh, armature, settings, rig, body] {
        assert!(graph.find_id_node(id).is_some(), "missing id node {id}");
    }

    graph.evaluate_copy_on_write(&main);
    let report = pipeline.build(&main, &mut graph);
    assert!(consistency_check(&graph).is_ok());
    assert_eq!(report.stats.entry_tags, 0);
}

/// Test that evaluation requests of the previous graph are remembered by the
/// rebuilt id node.
#[test]
fn evaluation_requests_carry_over() {
    let (main, scene) = load_scene();
    let mesh = main.find_by_name(IdType::Mesh, "Cube").unwrap();
    let pipeline = ViewLayerPipeline::new(scene, 0);

    let mut graph = Depsgraph::default();
    pipeline.build(&main, &mut graph);
    graph.add_special_eval_flag(mesh, 1 << 3).unwrap();
    let masks = CustomDataMasks {
        loop_: 1,
        ..CustomDataMasks::default()
    };
    graph.add_customdata_mask(mesh, masks).unwrap();

    pipeline.build(&main, &mut graph);

    let id_node = graph.find_id_node(mesh).unwrap();
    assert_eq!(id_node.previous_eval_flags, 1 << 3);
    assert_eq!(id_node.previous_customdata_masks, masks);
    assert_eq!(id_node.eval_flags, 0);
    assert_ne!(id_node.previously_visible_components_mask, 0);
}

/// Test that the preprocess operation of a geometry node tree prepares its
/// expanded duplicate.
#[test]
fn geometry_tree_preprocess_marks_duplicate() {
    let mut main = Main::new();
    let tree = main.add(Entity::new(
        "Nodes",
        EntityData::NodeTree(NodeTree::new(NodeTreeType::Geometry)),
    ));

    let mut graph = Depsgraph::default();
    FromIdsPipeline::new([tree]).build(&main, &mut graph);
    graph.evaluate_copy_on_write(&main);
    assert!(!graph.get_cow_id(tree).unwrap().is_preprocessed());

    let op = graph
        .find_operation(
            tree,
            NodeType::NtreeGeometryPreprocess,
            "",
            OpCode::NtreeGeometryPreprocess,
            "",
            -1,
        )
        .unwrap();
    let callback = op.callback().unwrap();
    callback(&EvalContext {
        main: &main,
        graph: &graph,
    });
    assert!(graph.get_cow_id(tree).unwrap().is_preprocessed());
}

/// Test that a collection requested on its own is visible, and so is its
/// content.
#[test]
fn collection_built_from_ids_is_visible() {
    let mut main = Main::new();
    let ob = object(&mut main, "Ob", Object::new(ObjectType::Empty));
    let collection = main.add(Entity::new(
        "Props",
        EntityData::Collection(Collection::new().with_objects([ob])),
    ));

    let mut graph = Depsgraph::default();
    FromIdsPipeline::new([collection]).build(&main, &mut graph);

    let node = graph.find_id_node(collection).unwrap();
    assert!(node.is_directly_visible);
    assert_ne!(node.visible_components_mask, 0);
    let ob_node = graph.find_id_node(ob).unwrap();
    assert!(ob_node.is_directly_visible);
    assert_ne!(ob_node.visible_components_mask, 0);

    assert!(graph.evaluate_copy_on_write(&main) > 0);
    assert!(graph.get_cow_id(ob).unwrap().is_expanded());
}

/// Test that a collection used by a modifier is as visible as the
/// collections around the modifier's object.
#[test]
fn modifier_collection_follows_surrounding_visibility() {
    fn cutter_scene(main: &mut Main) -> (EntityId, EntityId, EntityId) {
        let cutter = object(main, "Cutter", Object::new(ObjectType::Mesh));
        let operand = main.add(Entity::new(
            "Cutters",
            EntityData::Collection(Collection::new().with_objects([cutter])),
        ));
        let mut body = Object::new(ObjectType::Mesh);
        body.modifiers = vec![Modifier {
            references: vec![operand],
            ..Modifier::new("Boolean")
        }];
        let body = object(main, "Body", body);
        (body, operand, cutter)
    }

    // Shown through a base.
    let mut main = Main::new();
    let (body, operand, cutter) = cutter_scene(&mut main);
    let scene = scene_with_bases(&mut main, &[body]);
    let mut graph = Depsgraph::default();
    ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

    assert!(graph.find_id_node(body).unwrap().is_directly_visible);
    let operand_node = graph.find_id_node(operand).unwrap();
    assert!(operand_node.is_directly_visible);
    assert_ne!(operand_node.visible_components_mask, 0);
    assert!(graph.find_id_node(cutter).unwrap().is_directly_visible);

    // Inside a hidden collection.
    let mut main = Main::new();
    let (body, operand, cutter) = cutter_scene(&mut main);
    let hidden = main.add(Entity::new(
        "Hidden",
        EntityData::Collection(Collection {
            hide_viewport: true,
            ..Collection::new().with_objects([body])
        }),
    ));
    let mut graph = Depsgraph::default();
    build_with(&main, &mut graph, |builder| {
        builder.build_collection(None, hidden, &BuildContext::root());
    });

    assert!(!graph.find_id_node(operand).unwrap().is_directly_visible);
    assert!(!graph.find_id_node(cutter).unwrap().is_directly_visible);
}

/// Test that a render graph reads the render switches of collections,
/// modifiers and bases, and a viewport graph the viewport ones.
#[test]
fn evaluation_mode_selects_visibility_switches() {
    let mut main = Main::new();
    let prop = object(&mut main, "Prop", Object::new(ObjectType::Empty));
    let viewport_hidden = main.add(Entity::new(
        "ViewportHidden",
        EntityData::Collection(Collection {
            hide_viewport: true,
            ..Collection::new().with_objects([prop])
        }),
    ));
    let mut body = Object::new(ObjectType::Mesh);
    body.modifiers = vec![
        Modifier {
            show_render: false,
            references: vec![viewport_hidden],
            ..Modifier::new("Preview")
        },
        Modifier {
            show_viewport: false,
            ..Modifier::new("Final")
        },
    ];
    let body = object(&mut main, "Body", body);
    let sketch = object(&mut main, "Sketch", Object::new(ObjectType::Empty));
    let scene = main.add(Entity::new(
        "Scene",
        EntityData::Scene(Scene {
            view_layers: vec![ViewLayer {
                name: "ViewLayer".into(),
                bases: vec![
                    Base::new(body),
                    Base {
                        enabled_render: false,
                        ..Base::new(sketch)
                    },
                ],
                ..ViewLayer::default()
            }],
            ..Scene::default()
        }),
    ));

    for mode in [EvaluationMode::Viewport, EvaluationMode::Render] {
        let render = mode == EvaluationMode::Render;
        let mut graph = Depsgraph::new(BuildConfig {
            mode,
            ..BuildConfig::default()
        });
        ViewLayerPipeline::new(scene, 0).build(&main, &mut graph);

        let is_muted = |name: &str| {
            graph
                .find_operation(body, NodeType::Geometry, "", OpCode::Modifier, name, -1)
                .unwrap()
                .is_muted()
        };
        assert_eq!(is_muted("Preview"), render, "{mode:?}");
        assert_eq!(is_muted("Final"), !render, "{mode:?}");

        assert_eq!(
            graph.find_id_node(viewport_hidden).unwrap().is_directly_visible,
            render,
            "{mode:?}"
        );
        assert_eq!(graph.find_id_node(prop).unwrap().is_directly_visible, render, "{mode:?}");
        assert_eq!(graph.find_id_node(sketch).is_some(), !render, "{mode:?}");
    }
}
